//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod attendance_ledger;
pub mod capacity;
pub mod entities;
pub mod errors;
pub mod grade_ledger;
pub mod lifecycle;

pub use attendance_ledger::{AttendanceTally, ExcusedPolicy};
pub use entities::{
    AttendanceMark, AttendanceStatus, Course, CourseId, CourseStatus, Enrollment,
    EnrollmentAggregate, EnrollmentId, Grade, StudentId,
};
pub use errors::DomainError;
pub use grade_ledger::LetterGrade;
pub use lifecycle::{EnrollmentOperation, EnrollmentStatus};
