//! Domain errors. Used by the engine, ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use crate::domain::entities::{CourseId, CourseStatus, EnrollmentId, StudentId};
use crate::domain::lifecycle::{EnrollmentOperation, EnrollmentStatus};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("cannot {operation}: enrollment is {current}")]
    InvalidStateTransition {
        current: EnrollmentStatus,
        operation: EnrollmentOperation,
    },

    #[error("student {student_id} already has an active enrollment in course {course_id}")]
    DuplicateEnrollment {
        student_id: StudentId,
        course_id: CourseId,
    },

    #[error("enrollment {enrollment_id} already has attendance for {date}")]
    DuplicateAttendanceDate {
        enrollment_id: EnrollmentId,
        date: NaiveDate,
    },

    #[error("course {course_id} is not accepting enrollments ({status}, {active}/{max_students} active)")]
    CourseAtCapacity {
        course_id: CourseId,
        status: CourseStatus,
        active: u32,
        max_students: u32,
    },

    #[error("invalid grade: {0}")]
    InvalidGrade(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Report error: {0}")]
    Report(String),
}

impl DomainError {
    /// Stable identifier per failure condition, for callers that translate
    /// errors into responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::DuplicateEnrollment { .. } => "DUPLICATE_ENROLLMENT",
            Self::DuplicateAttendanceDate { .. } => "DUPLICATE_ATTENDANCE_DATE",
            Self::CourseAtCapacity { .. } => "COURSE_AT_CAPACITY",
            Self::InvalidGrade(_) => "INVALID_GRADE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Parse(_) => "PARSE",
            Self::Repo(_) => "REPOSITORY",
            Self::Report(_) => "REPORT",
        }
    }

    /// Rule violations fail identically on retry; only storage failures may be transient.
    pub fn is_domain_rule(&self) -> bool {
        !matches!(self, Self::Repo(_) | Self::Report(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_status_and_operation() {
        let err = DomainError::InvalidStateTransition {
            current: EnrollmentStatus::Dropped,
            operation: EnrollmentOperation::RecordGrade,
        };
        assert_eq!(
            err.to_string(),
            "cannot record a grade: enrollment is DROPPED"
        );
        assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
        assert!(err.is_domain_rule());
        assert!(!DomainError::Repo("disk full".into()).is_domain_rule());
    }
}
