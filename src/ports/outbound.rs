//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Course, CourseId, DomainError, Enrollment, EnrollmentAggregate, EnrollmentId, StudentId,
};

/// Persistence of enrollment aggregates (enrollment + grades + attendance).
#[async_trait::async_trait]
pub trait EnrollmentRepoPort: Send + Sync {
    /// Load one aggregate. `None` when the id is unknown.
    async fn get_aggregate(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<EnrollmentAggregate>, DomainError>;

    /// Every enrollment, active or terminal, for one (student, course) pair.
    async fn find_enrollments(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<Enrollment>, DomainError>;

    /// All aggregates in a course, oldest enrollment first.
    async fn list_by_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<EnrollmentAggregate>, DomainError>;

    /// All enrollments of a student, oldest first.
    async fn list_by_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, DomainError>;

    /// Durably create a new enrollment.
    ///
    /// Must re-check, atomically with the write, that the pair has no active
    /// enrollment (`DuplicateEnrollment`) and that the course still accepts
    /// enrollments (`CourseAtCapacity`). The engine's own check happens before
    /// this call and can race with concurrent enrollments.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), DomainError>;

    /// Replace the stored aggregate with `aggregate` (status, final grade, child lists).
    async fn save_aggregate(&self, aggregate: &EnrollmentAggregate) -> Result<(), DomainError>;

    /// Administrative hard delete. Returns false when nothing was deleted.
    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, DomainError>;
}

/// Course directory. Read-only capacity projections for the engine.
#[async_trait::async_trait]
pub trait CourseDirectoryPort: Send + Sync {
    /// Course with `active_enrollment_count` computed from current enrollments.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, DomainError>;

    /// Create or update the course definition. The stored active count is ignored.
    async fn register_course(&self, course: &Course) -> Result<(), DomainError>;
}
