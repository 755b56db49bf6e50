//! Enrollment use cases: load aggregate -> run engine -> persist.
//!
//! - Reads the course projection and prior enrollments through the ports
//! - Lets the engine decide; never mutates state it was not handed back
//! - Persists only successful results; the repository re-checks enrollment
//!   uniqueness and capacity at commit

use crate::domain::{
    AttendanceMark, CourseId, DomainError, Enrollment, EnrollmentAggregate, EnrollmentId, Grade,
    StudentId,
};
use crate::ports::{CourseDirectoryPort, EnrollmentRepoPort};
use crate::usecases::record_engine::{
    AcademicRecordEngine, EnrollRequest, EnrollmentCommand, EnrollmentSummary, GradeRecorded,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Enrollment service. Coordinates the engine with persistence.
pub struct EnrollmentService {
    engine: AcademicRecordEngine,
    enrollments: Arc<dyn EnrollmentRepoPort>,
    courses: Arc<dyn CourseDirectoryPort>,
    passing_threshold: Decimal,
}

impl EnrollmentService {
    pub fn new(
        engine: AcademicRecordEngine,
        enrollments: Arc<dyn EnrollmentRepoPort>,
        courses: Arc<dyn CourseDirectoryPort>,
        passing_threshold: Decimal,
    ) -> Self {
        Self {
            engine,
            enrollments,
            courses,
            passing_threshold,
        }
    }

    pub fn passing_threshold(&self) -> Decimal {
        self.passing_threshold
    }

    /// Enroll a student. Fails on an active duplicate or a full/closed course.
    pub async fn enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        enrollment_date: NaiveDate,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("course {}", course_id)))?;
        let existing = self
            .enrollments
            .find_enrollments(student_id, course_id)
            .await?;

        let aggregate = self.engine.enroll(
            EnrollRequest {
                id: EnrollmentId::new(),
                student_id,
                enrollment_date,
            },
            &course,
            &existing,
        )?;

        if let Err(e) = self.enrollments.insert_enrollment(&aggregate.enrollment).await {
            warn!(%student_id, %course_id, error = %e, "enrollment rejected at commit");
            return Err(e);
        }

        info!(
            enrollment_id = %aggregate.id(),
            %student_id,
            %course_id,
            "student enrolled"
        );
        Ok(aggregate)
    }

    /// Record a grade and return the recomputed weighted percentage.
    pub async fn record_grade(
        &self,
        id: EnrollmentId,
        grade: Grade,
    ) -> Result<GradeRecorded, DomainError> {
        let current = self.load(id).await?;
        let recorded = self.engine.record_grade(&current, grade)?;
        self.enrollments.save_aggregate(&recorded.aggregate).await?;
        info!(
            enrollment_id = %id,
            grades = recorded.aggregate.grades.len(),
            weighted = ?recorded.weighted_percentage,
            "grade recorded"
        );
        Ok(recorded)
    }

    pub async fn record_attendance(
        &self,
        id: EnrollmentId,
        mark: AttendanceMark,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let (date, status) = (mark.date, mark.status);
        let next = self
            .execute(id, EnrollmentCommand::RecordAttendance(mark))
            .await?;
        info!(enrollment_id = %id, %date, %status, "attendance recorded");
        Ok(next)
    }

    /// Finalize with `passing_threshold`, or the configured threshold when `None`.
    pub async fn finalize(
        &self,
        id: EnrollmentId,
        passing_threshold: Option<Decimal>,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let passing_threshold = passing_threshold.unwrap_or(self.passing_threshold);
        let next = self
            .execute(id, EnrollmentCommand::Finalize { passing_threshold })
            .await?;
        info!(
            enrollment_id = %id,
            status = %next.status(),
            final_grade = ?next.enrollment.final_grade,
            %passing_threshold,
            "enrollment finalized"
        );
        Ok(next)
    }

    pub async fn withdraw(&self, id: EnrollmentId) -> Result<EnrollmentAggregate, DomainError> {
        let next = self.execute(id, EnrollmentCommand::Withdraw).await?;
        info!(enrollment_id = %id, "enrollment dropped");
        Ok(next)
    }

    pub async fn force_fail(&self, id: EnrollmentId) -> Result<EnrollmentAggregate, DomainError> {
        let next = self.execute(id, EnrollmentCommand::ForceFail).await?;
        info!(enrollment_id = %id, final_grade = ?next.enrollment.final_grade, "enrollment failed by caller");
        Ok(next)
    }

    pub async fn summary(&self, id: EnrollmentId) -> Result<EnrollmentSummary, DomainError> {
        let aggregate = self.load(id).await?;
        Ok(self.engine.summarize(&aggregate))
    }

    pub async fn student_enrollments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, DomainError> {
        self.enrollments.list_by_student(student_id).await
    }

    /// Administrative hard delete. Not part of the lifecycle.
    pub async fn delete(&self, id: EnrollmentId) -> Result<(), DomainError> {
        if self.enrollments.delete_enrollment(id).await? {
            info!(enrollment_id = %id, "enrollment deleted");
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("enrollment {}", id)))
        }
    }

    async fn execute(
        &self,
        id: EnrollmentId,
        command: EnrollmentCommand,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let current = self.load(id).await?;
        let next = self.engine.apply(&current, command).inspect_err(|e| {
            debug!(enrollment_id = %id, code = e.code(), error = %e, "command rejected");
        })?;
        self.enrollments.save_aggregate(&next).await?;
        Ok(next)
    }

    async fn load(&self, id: EnrollmentId) -> Result<EnrollmentAggregate, DomainError> {
        self.enrollments
            .get_aggregate(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("enrollment {}", id)))
    }
}
