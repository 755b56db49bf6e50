//! Course capacity guard.
//!
//! Necessary but not sufficient: two concurrent enrollments can both pass this
//! check for the last seat. The persistence adapter repeats it inside the
//! commit (see `EnrollmentRepoPort::insert_enrollment`).

use crate::domain::entities::Course;
use crate::domain::errors::DomainError;

pub fn can_enroll(course: &Course) -> bool {
    course.status.allows_enrollments() && course.active_enrollment_count < course.max_students
}

pub fn available_spots(course: &Course) -> u32 {
    course
        .max_students
        .saturating_sub(course.active_enrollment_count)
}

pub fn is_at_capacity(course: &Course) -> bool {
    course.active_enrollment_count >= course.max_students
}

/// `CourseAtCapacity` unless `can_enroll`.
pub fn ensure_can_enroll(course: &Course) -> Result<(), DomainError> {
    if can_enroll(course) {
        Ok(())
    } else {
        Err(DomainError::CourseAtCapacity {
            course_id: course.id,
            status: course.status,
            active: course.active_enrollment_count,
            max_students: course.max_students,
        })
    }
}
