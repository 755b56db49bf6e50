//! Domain entities. Pure data structures for the academic record core.
//!
//! Everything is keyed by identifier; no entity holds a reference to another.
//! Storage metadata (created/updated timestamps) is stamped by adapters, not here.

use crate::domain::errors::DomainError;
use crate::domain::grade_ledger::{round_half_up, LetterGrade};
use crate::domain::lifecycle::EnrollmentStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub i64);

/// Enrollment identifier. Generated by the application layer and handed to the
/// engine so that engine operations stay deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub Uuid);

impl EnrollmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EnrollmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EnrollmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One student's registration in one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    /// Percentage in 0..=100. Set by finalization (or carried from a prior system).
    pub final_grade: Option<Decimal>,
}

impl Enrollment {
    /// New enrollment in the initial `Enrolled` status with no final grade.
    pub fn new(
        id: EnrollmentId,
        student_id: StudentId,
        course_id: CourseId,
        enrollment_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            student_id,
            course_id,
            enrollment_date,
            status: EnrollmentStatus::Enrolled,
            final_grade: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// True when this enrollment pairs the given student and course.
    pub fn pairs(&self, student_id: StudentId, course_id: CourseId) -> bool {
        self.student_id == student_id && self.course_id == course_id
    }
}

/// One scored assignment. Used both as the command input and as the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub assignment_name: String,
    pub score: Decimal,
    pub max_score: Decimal,
    /// 0 < weight <= 100.
    pub weight: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Grade {
    /// Grade out of 100 with weight 1, the defaults used when a caller omits them.
    pub fn new(assignment_name: impl Into<String>, score: Decimal, date: NaiveDate) -> Self {
        Self {
            assignment_name: assignment_name.into(),
            score,
            max_score: Decimal::ONE_HUNDRED,
            weight: Decimal::ONE,
            date,
            comments: None,
        }
    }

    pub fn with_max_score(mut self, max_score: Decimal) -> Self {
        self.max_score = max_score;
        self
    }

    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Rejects out-of-range grades. Nothing is clamped.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.assignment_name.trim().is_empty() {
            return Err(DomainError::InvalidGrade(
                "assignment name is required".into(),
            ));
        }
        if self.score < Decimal::ZERO {
            return Err(DomainError::InvalidGrade(format!(
                "score {} is negative",
                self.score
            )));
        }
        if self.max_score <= Decimal::ZERO {
            return Err(DomainError::InvalidGrade(format!(
                "max score {} must be greater than zero",
                self.max_score
            )));
        }
        if self.score > self.max_score {
            return Err(DomainError::InvalidGrade(format!(
                "score {} exceeds max score {}",
                self.score, self.max_score
            )));
        }
        if self.weight <= Decimal::ZERO || self.weight > Decimal::ONE_HUNDRED {
            return Err(DomainError::InvalidGrade(format!(
                "weight {} must be in (0, 100]",
                self.weight
            )));
        }
        Ok(())
    }

    /// Unrounded `score / max * 100`. Zero when max is zero (never the case for a validated grade).
    pub fn raw_percentage(&self) -> Decimal {
        if self.max_score.is_zero() {
            return Decimal::ZERO;
        }
        self.score / self.max_score * Decimal::ONE_HUNDRED
    }

    /// Percentage of this single grade, 2 decimal places, half-up.
    pub fn percentage(&self) -> Decimal {
        round_half_up(self.raw_percentage())
    }

    pub fn letter_grade(&self) -> LetterGrade {
        LetterGrade::from_percentage(self.percentage())
    }

    /// e.g. `"85.00/100.00 (85.00%)"`.
    pub fn formatted(&self) -> String {
        format!(
            "{:.2}/{:.2} ({:.2}%)",
            self.score,
            self.max_score,
            self.percentage()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// Present and late both count as attended.
    pub fn counts_as_present(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }

    pub fn counts_as_absent(self) -> bool {
        self == Self::Absent
    }

    pub fn is_excused(self) -> bool {
        self == Self::Excused
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "late" => Ok(Self::Late),
            "excused" => Ok(Self::Excused),
            other => Err(DomainError::Parse(format!(
                "invalid attendance status: {}",
                other
            ))),
        }
    }
}

/// One daily attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub comments: Option<String>,
}

impl AttendanceMark {
    pub fn new(date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            date,
            status,
            comments: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Inactive,
    Completed,
}

impl CourseStatus {
    pub fn allows_enrollments(self) -> bool {
        self == Self::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "completed" => Ok(Self::Completed),
            other => Err(DomainError::Parse(format!("invalid course status: {}", other))),
        }
    }
}

/// Capacity-relevant projection of a course, supplied by the course directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub max_students: u32,
    /// Count of enrollments currently in `Enrolled`. Derived by the directory.
    #[serde(default)]
    pub active_enrollment_count: u32,
    pub status: CourseStatus,
}

impl Course {
    pub fn new(
        id: CourseId,
        code: impl Into<String>,
        name: impl Into<String>,
        max_students: u32,
    ) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            max_students,
            active_enrollment_count: 0,
            status: CourseStatus::Active,
        }
    }

    /// `CODE - Name`.
    pub fn full_name(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

/// An enrollment with its child records: the unit the engine operates on and
/// the persistence port loads and stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentAggregate {
    pub enrollment: Enrollment,
    #[serde(default)]
    pub grades: Vec<Grade>,
    #[serde(default)]
    pub attendance: Vec<AttendanceMark>,
}

impl EnrollmentAggregate {
    pub fn new(enrollment: Enrollment) -> Self {
        Self {
            enrollment,
            grades: Vec::new(),
            attendance: Vec::new(),
        }
    }

    pub fn id(&self) -> EnrollmentId {
        self.enrollment.id
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.enrollment.status
    }

    pub fn has_mark_on(&self, date: NaiveDate) -> bool {
        self.attendance.iter().any(|m| m.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn grade_validation_rejects_out_of_range_values() {
        let over = Grade::new("Quiz 1", dec!(101), day());
        assert!(matches!(over.validate(), Err(DomainError::InvalidGrade(_))));

        let negative = Grade::new("Quiz 1", dec!(-1), day());
        assert!(matches!(negative.validate(), Err(DomainError::InvalidGrade(_))));

        let zero_max = Grade::new("Quiz 1", dec!(0), day()).with_max_score(dec!(0));
        assert!(matches!(zero_max.validate(), Err(DomainError::InvalidGrade(_))));

        let zero_weight = Grade::new("Quiz 1", dec!(50), day()).with_weight(dec!(0));
        assert!(matches!(zero_weight.validate(), Err(DomainError::InvalidGrade(_))));

        let heavy = Grade::new("Quiz 1", dec!(50), day()).with_weight(dec!(100.01));
        assert!(matches!(heavy.validate(), Err(DomainError::InvalidGrade(_))));

        let blank = Grade::new("  ", dec!(50), day());
        assert!(matches!(blank.validate(), Err(DomainError::InvalidGrade(_))));
    }

    #[test]
    fn grade_at_boundaries_is_valid() {
        assert!(Grade::new("Final", dec!(100), day()).validate().is_ok());
        assert!(Grade::new("Final", dec!(0), day()).with_weight(dec!(100)).validate().is_ok());
    }

    #[test]
    fn single_grade_percentage_and_display() {
        let g = Grade::new("Essay", dec!(17), day()).with_max_score(dec!(20));
        assert_eq!(g.percentage(), dec!(85.00));
        assert_eq!(g.letter_grade(), LetterGrade::B);
        assert_eq!(g.formatted(), "17.00/20.00 (85.00%)");

        let third = Grade::new("Lab", dec!(1), day()).with_max_score(dec!(3));
        assert_eq!(third.percentage(), dec!(33.33));
    }

    #[test]
    fn attendance_status_parses_case_insensitively() {
        assert_eq!("LATE".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Late);
        assert!("tardy".parse::<AttendanceStatus>().is_err());
        assert!(AttendanceStatus::Late.counts_as_present());
        assert!(!AttendanceStatus::Excused.counts_as_present());
        assert!(!AttendanceStatus::Excused.counts_as_absent());
    }

    #[test]
    fn aggregate_serializes_with_lowercase_enums() {
        let id = EnrollmentId(Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap());
        let mut agg = EnrollmentAggregate::new(Enrollment::new(id, StudentId(7), CourseId(3), day()));
        agg.attendance.push(AttendanceMark::new(day(), AttendanceStatus::Excused));

        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["enrollment"]["id"], "11111111-2222-4333-8444-555555555555");
        assert_eq!(json["enrollment"]["status"], "ENROLLED");
        assert_eq!(json["enrollment"]["student_id"], 7);
        assert_eq!(json["attendance"][0]["status"], "excused");

        let decoded: EnrollmentAggregate = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, agg);
    }
}
