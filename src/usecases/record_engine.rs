//! Academic record engine. Composes the lifecycle, the ledgers and the
//! capacity guard into enrollment operations.
//!
//! Every operation is a pure function from (current state, command) to a new
//! aggregate or a `DomainError`. The input is never modified; nothing here
//! performs I/O, logs, or reads the clock.

use crate::domain::attendance_ledger::{AttendanceTally, ExcusedPolicy};
use crate::domain::capacity;
use crate::domain::grade_ledger::{compute_weighted_percentage, is_passing, LetterGrade};
use crate::domain::{
    AttendanceMark, Course, CourseId, DomainError, Enrollment, EnrollmentAggregate, EnrollmentId,
    EnrollmentOperation, EnrollmentStatus, Grade, StudentId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Input to [`AcademicRecordEngine::enroll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollRequest {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub enrollment_date: NaiveDate,
}

/// Commands applicable to an existing enrollment.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentCommand {
    RecordGrade(Grade),
    RecordAttendance(AttendanceMark),
    Finalize { passing_threshold: Decimal },
    Withdraw,
    ForceFail,
}

/// Result of recording a grade: the new aggregate plus the recomputed ledger figure.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecorded {
    pub aggregate: EnrollmentAggregate,
    pub weighted_percentage: Option<Decimal>,
}

/// Read model for one enrollment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentSummary {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub final_grade: Option<Decimal>,
    pub weighted_percentage: Option<Decimal>,
    pub letter_grade: Option<LetterGrade>,
    pub presence_percentage: Decimal,
    pub attendance: AttendanceTally,
    pub grade_count: usize,
    pub mark_count: usize,
}

impl EnrollmentSummary {
    /// Final grade when set, otherwise the live weighted percentage.
    pub fn effective_grade(&self) -> Option<Decimal> {
        self.final_grade.or(self.weighted_percentage)
    }

    /// No grade at all counts as not passed.
    pub fn has_passed(&self, passing_threshold: Decimal) -> bool {
        self.effective_grade()
            .is_some_and(|g| is_passing(g, passing_threshold))
    }
}

/// Stateless apart from the attendance policy it was built with.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcademicRecordEngine {
    excused_policy: ExcusedPolicy,
}

impl AcademicRecordEngine {
    pub fn new(excused_policy: ExcusedPolicy) -> Self {
        Self { excused_policy }
    }

    pub fn excused_policy(&self) -> ExcusedPolicy {
        self.excused_policy
    }

    /// Create an `Enrolled` enrollment for `request.student_id` in `course`.
    ///
    /// `existing` holds the enrollments already recorded for the pair; any
    /// active one is a `DuplicateEnrollment`. Terminal ones do not block
    /// re-enrollment. Capacity is checked second.
    pub fn enroll(
        &self,
        request: EnrollRequest,
        course: &Course,
        existing: &[Enrollment],
    ) -> Result<EnrollmentAggregate, DomainError> {
        if existing
            .iter()
            .any(|e| e.pairs(request.student_id, course.id) && e.is_active())
        {
            return Err(DomainError::DuplicateEnrollment {
                student_id: request.student_id,
                course_id: course.id,
            });
        }
        capacity::ensure_can_enroll(course)?;

        Ok(EnrollmentAggregate::new(Enrollment::new(
            request.id,
            request.student_id,
            course.id,
            request.enrollment_date,
        )))
    }

    pub fn apply(
        &self,
        aggregate: &EnrollmentAggregate,
        command: EnrollmentCommand,
    ) -> Result<EnrollmentAggregate, DomainError> {
        match command {
            EnrollmentCommand::RecordGrade(grade) => {
                self.record_grade(aggregate, grade).map(|r| r.aggregate)
            }
            EnrollmentCommand::RecordAttendance(mark) => self.record_attendance(aggregate, mark),
            EnrollmentCommand::Finalize { passing_threshold } => {
                self.finalize(aggregate, passing_threshold)
            }
            EnrollmentCommand::Withdraw => self.withdraw(aggregate),
            EnrollmentCommand::ForceFail => self.force_fail(aggregate),
        }
    }

    /// Append a grade. The state guard is checked before the grade itself.
    pub fn record_grade(
        &self,
        aggregate: &EnrollmentAggregate,
        grade: Grade,
    ) -> Result<GradeRecorded, DomainError> {
        aggregate.status().ensure_grading()?;
        grade.validate()?;

        let mut next = aggregate.clone();
        next.grades.push(grade);
        let weighted_percentage = compute_weighted_percentage(&next.grades);
        Ok(GradeRecorded {
            aggregate: next,
            weighted_percentage,
        })
    }

    /// Append a mark. One mark per date.
    pub fn record_attendance(
        &self,
        aggregate: &EnrollmentAggregate,
        mark: AttendanceMark,
    ) -> Result<EnrollmentAggregate, DomainError> {
        aggregate.status().ensure_attendance()?;
        if aggregate.has_mark_on(mark.date) {
            return Err(DomainError::DuplicateAttendanceDate {
                enrollment_id: aggregate.id(),
                date: mark.date,
            });
        }

        let mut next = aggregate.clone();
        next.attendance.push(mark);
        Ok(next)
    }

    /// Close an `Enrolled` enrollment as `Completed` or `Failed`.
    ///
    /// The grade is the weighted percentage, or the already-set final grade
    /// when there are no grades. With neither, the outcome is `Failed` and the
    /// final grade stays unset.
    pub fn finalize(
        &self,
        aggregate: &EnrollmentAggregate,
        passing_threshold: Decimal,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let grade =
            compute_weighted_percentage(&aggregate.grades).or(aggregate.enrollment.final_grade);
        let passed = grade.is_some_and(|g| is_passing(g, passing_threshold));
        let status = aggregate.status().transition(
            EnrollmentStatus::finalized(passed),
            EnrollmentOperation::Finalize,
        )?;

        let mut next = aggregate.clone();
        next.enrollment.status = status;
        next.enrollment.final_grade = grade;
        Ok(next)
    }

    /// Caller-initiated withdrawal.
    pub fn withdraw(
        &self,
        aggregate: &EnrollmentAggregate,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let status = aggregate
            .status()
            .transition(EnrollmentStatus::Dropped, EnrollmentOperation::Withdraw)?;

        let mut next = aggregate.clone();
        next.enrollment.status = status;
        Ok(next)
    }

    /// Fail an `Enrolled` enrollment regardless of its grades. Authorization is the caller's.
    pub fn force_fail(
        &self,
        aggregate: &EnrollmentAggregate,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let status = aggregate
            .status()
            .transition(EnrollmentStatus::Failed, EnrollmentOperation::ForceFail)?;

        let mut next = aggregate.clone();
        next.enrollment.status = status;
        next.enrollment.final_grade =
            compute_weighted_percentage(&next.grades).or(next.enrollment.final_grade);
        Ok(next)
    }

    pub fn summarize(&self, aggregate: &EnrollmentAggregate) -> EnrollmentSummary {
        let e = &aggregate.enrollment;
        let weighted_percentage = compute_weighted_percentage(&aggregate.grades);
        let attendance = AttendanceTally::from_marks(&aggregate.attendance);
        let letter_grade = e
            .final_grade
            .or(weighted_percentage)
            .map(LetterGrade::from_percentage);

        EnrollmentSummary {
            enrollment_id: e.id,
            student_id: e.student_id,
            course_id: e.course_id,
            enrollment_date: e.enrollment_date,
            status: e.status,
            final_grade: e.final_grade,
            weighted_percentage,
            letter_grade,
            presence_percentage: attendance.presence_percentage(self.excused_policy),
            attendance,
            grade_count: aggregate.grades.len(),
            mark_count: aggregate.attendance.len(),
        }
    }
}
