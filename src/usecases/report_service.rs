//! Report service. Course-level statistics and gradebook files.
//!
//! Coordinates between the repository (enrollments), the engine (read models)
//! and the filesystem (reports).

use crate::adapters::export::summaries_to_csv;
use crate::domain::capacity;
use crate::domain::grade_ledger::round_half_up;
use crate::domain::{Course, CourseId, DomainError, EnrollmentStatus};
use crate::ports::{CourseDirectoryPort, EnrollmentRepoPort};
use crate::usecases::record_engine::{AcademicRecordEngine, EnrollmentSummary};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// Enrollment counts per lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    pub enrolled: u32,
    pub completed: u32,
    pub failed: u32,
    pub dropped: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        self.enrolled + self.completed + self.failed + self.dropped
    }
}

/// Statistics for one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseReport {
    pub course_id: CourseId,
    pub course: String,
    pub max_students: u32,
    pub available_spots: u32,
    pub at_capacity: bool,
    pub counts: StatusCounts,
    /// Over enrollments that carry a final grade.
    pub average_final_grade: Option<Decimal>,
    pub highest_final_grade: Option<Decimal>,
    pub lowest_final_grade: Option<Decimal>,
    /// Over enrollments with at least one attendance mark.
    pub average_presence: Option<Decimal>,
    /// Enrollments with an effective grade at or above the threshold.
    pub passing: u32,
}

impl CourseReport {
    pub fn build(course: &Course, rows: &[EnrollmentSummary], passing_threshold: Decimal) -> Self {
        let mut counts = StatusCounts::default();
        for r in rows {
            match r.status {
                EnrollmentStatus::Enrolled => counts.enrolled += 1,
                EnrollmentStatus::Completed => counts.completed += 1,
                EnrollmentStatus::Failed => counts.failed += 1,
                EnrollmentStatus::Dropped => counts.dropped += 1,
            }
        }

        let finals: Vec<Decimal> = rows.iter().filter_map(|r| r.final_grade).collect();
        let presences: Vec<Decimal> = rows
            .iter()
            .filter(|r| r.mark_count > 0)
            .map(|r| r.presence_percentage)
            .collect();

        Self {
            course_id: course.id,
            course: course.full_name(),
            max_students: course.max_students,
            available_spots: capacity::available_spots(course),
            at_capacity: capacity::is_at_capacity(course),
            counts,
            average_final_grade: mean(&finals),
            highest_final_grade: finals.iter().max().copied(),
            lowest_final_grade: finals.iter().min().copied(),
            average_presence: mean(&presences),
            passing: rows
                .iter()
                .filter(|r| r.has_passed(passing_threshold))
                .count() as u32,
        }
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some(round_half_up(sum / Decimal::from(values.len())))
}

/// Service for course reports and gradebook exports.
pub struct ReportService {
    engine: AcademicRecordEngine,
    enrollments: Arc<dyn EnrollmentRepoPort>,
    courses: Arc<dyn CourseDirectoryPort>,
    reports_dir: PathBuf,
    passing_threshold: Decimal,
}

impl ReportService {
    pub fn new(
        engine: AcademicRecordEngine,
        enrollments: Arc<dyn EnrollmentRepoPort>,
        courses: Arc<dyn CourseDirectoryPort>,
        reports_dir: PathBuf,
        passing_threshold: Decimal,
    ) -> Self {
        Self {
            engine,
            enrollments,
            courses,
            reports_dir,
            passing_threshold,
        }
    }

    /// Read models for every enrollment in the course, oldest first.
    pub async fn course_summaries(
        &self,
        course_id: CourseId,
    ) -> Result<(Course, Vec<EnrollmentSummary>), DomainError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("course {}", course_id)))?;
        let rows = self
            .enrollments
            .list_by_course(course_id)
            .await?
            .iter()
            .map(|a| self.engine.summarize(a))
            .collect();
        Ok((course, rows))
    }

    pub async fn course_report(&self, course_id: CourseId) -> Result<CourseReport, DomainError> {
        let (course, rows) = self.course_summaries(course_id).await?;
        let report = CourseReport::build(&course, &rows, self.passing_threshold);
        info!(
            %course_id,
            enrollments = report.counts.total(),
            average_final_grade = ?report.average_final_grade,
            "course report built"
        );
        Ok(report)
    }

    /// Write the course gradebook as CSV into the reports directory. Returns the file path.
    pub async fn export_gradebook(&self, course_id: CourseId) -> Result<PathBuf, DomainError> {
        let (course, rows) = self.course_summaries(course_id).await?;
        let csv = summaries_to_csv(&course, &rows)
            .map_err(|e| DomainError::Report(format!("Failed to generate CSV: {}", e)))?;

        let path = self.reports_dir.join(format!(
            "gradebook_{}_{}.csv",
            course.id,
            file_safe(&course.code)
        ));
        self.write_report(&path, csv).await?;
        info!(path = %path.display(), rows = rows.len(), "gradebook exported");
        Ok(path)
    }

    /// Write the course report as Markdown into the reports directory. Returns the file path.
    pub async fn write_course_report(&self, course_id: CourseId) -> Result<PathBuf, DomainError> {
        let report = self.course_report(course_id).await?;
        let path = self
            .reports_dir
            .join(format!("course_report_{}.md", report.course_id));
        self.write_report(&path, render_markdown(&report, self.passing_threshold))
            .await?;
        info!(path = %path.display(), "report generated");
        Ok(path)
    }

    async fn write_report(&self, path: &Path, content: String) -> Result<(), DomainError> {
        fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| DomainError::Report(format!("Failed to create reports dir: {}", e)))?;
        fs::write(path, content)
            .await
            .map_err(|e| DomainError::Report(format!("Failed to write report: {}", e)))
    }
}

fn file_safe(code: &str) -> String {
    code.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn or_dash(value: Option<Decimal>) -> String {
    value
        .map(|d| format!("{:.2}", d))
        .unwrap_or_else(|| "-".to_string())
}

fn render_markdown(report: &CourseReport, passing_threshold: Decimal) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Course Report: {}\n\n", report.course));
    md.push_str(&format!(
        "**Capacity:** {} | **Available spots:** {}\n\n",
        report.max_students, report.available_spots
    ));
    md.push_str("---\n\n");

    md.push_str("## Enrollments\n\n");
    md.push_str("| Status | Count |\n|---|---|\n");
    md.push_str(&format!("| Enrolled | {} |\n", report.counts.enrolled));
    md.push_str(&format!("| Completed | {} |\n", report.counts.completed));
    md.push_str(&format!("| Failed | {} |\n", report.counts.failed));
    md.push_str(&format!("| Dropped | {} |\n\n", report.counts.dropped));

    md.push_str("## Grades\n\n");
    md.push_str(&format!(
        "- Average final grade: {}\n",
        or_dash(report.average_final_grade)
    ));
    md.push_str(&format!(
        "- Highest final grade: {}\n",
        or_dash(report.highest_final_grade)
    ));
    md.push_str(&format!(
        "- Lowest final grade: {}\n",
        or_dash(report.lowest_final_grade)
    ));
    md.push_str(&format!(
        "- Passing (>= {:.2}): {}\n\n",
        passing_threshold, report.passing
    ));

    md.push_str("## Attendance\n\n");
    md.push_str(&format!(
        "- Average presence: {}\n\n",
        or_dash(report.average_presence)
    ));

    md.push_str("---\n");
    md.push_str("*Generated by academic-records*\n");
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::JsonStore;
    use crate::domain::{AttendanceMark, AttendanceStatus, Grade, StudentId};
    use crate::usecases::enrollment_service::EnrollmentService;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    struct Fixture {
        enrollments: EnrollmentService,
        reports: ReportService,
        dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path().join("records.json")));
        store.load().await.unwrap();
        store
            .register_course(&Course::new(CourseId(5), "BIO/150", "Cell Biology", 10))
            .await
            .unwrap();
        let engine = AcademicRecordEngine::default();
        let repo: Arc<dyn EnrollmentRepoPort> = store.clone();
        let courses: Arc<dyn CourseDirectoryPort> = store;
        Fixture {
            enrollments: EnrollmentService::new(
                engine,
                Arc::clone(&repo),
                Arc::clone(&courses),
                dec!(60),
            ),
            reports: ReportService::new(
                engine,
                repo,
                courses,
                dir.path().join("reports"),
                dec!(60),
            ),
            dir,
        }
    }

    /// One completed at 90, one failed at 50, one dropped, one still enrolled.
    async fn populate(f: &Fixture) {
        let svc = &f.enrollments;
        let a = svc.enroll(StudentId(1), CourseId(5), day(1)).await.unwrap().id();
        svc.record_grade(a, Grade::new("Exam", dec!(90), day(10))).await.unwrap();
        svc.record_attendance(a, AttendanceMark::new(day(2), AttendanceStatus::Present))
            .await
            .unwrap();
        svc.finalize(a, None).await.unwrap();

        let b = svc.enroll(StudentId(2), CourseId(5), day(1)).await.unwrap().id();
        svc.record_grade(b, Grade::new("Exam", dec!(50), day(10))).await.unwrap();
        svc.record_attendance(b, AttendanceMark::new(day(2), AttendanceStatus::Absent))
            .await
            .unwrap();
        svc.finalize(b, None).await.unwrap();

        let c = svc.enroll(StudentId(3), CourseId(5), day(1)).await.unwrap().id();
        svc.withdraw(c).await.unwrap();

        svc.enroll(StudentId(4), CourseId(5), day(3)).await.unwrap();
    }

    #[tokio::test]
    async fn course_report_aggregates_statuses_and_grades() {
        let f = fixture().await;
        populate(&f).await;

        let report = f.reports.course_report(CourseId(5)).await.unwrap();
        assert_eq!(
            report.counts,
            StatusCounts {
                enrolled: 1,
                completed: 1,
                failed: 1,
                dropped: 1
            }
        );
        assert_eq!(report.available_spots, 9);
        assert!(!report.at_capacity);
        assert_eq!(report.average_final_grade, Some(dec!(70.00)));
        assert_eq!(report.highest_final_grade, Some(dec!(90.00)));
        assert_eq!(report.lowest_final_grade, Some(dec!(50.00)));
        assert_eq!(report.average_presence, Some(dec!(50.00)));
        assert_eq!(report.passing, 1);
        assert_eq!(report.course, "BIO/150 - Cell Biology");
    }

    #[test]
    fn empty_course_has_no_averages() {
        let course = Course::new(CourseId(1), "X", "Empty", 3);
        let report = CourseReport::build(&course, &[], dec!(60));
        assert_eq!(report.counts.total(), 0);
        assert_eq!(report.average_final_grade, None);
        assert_eq!(report.highest_final_grade, None);
        assert_eq!(report.average_presence, None);
        assert_eq!(report.available_spots, 3);
    }

    #[tokio::test]
    async fn exports_write_files_into_reports_dir() {
        let f = fixture().await;
        populate(&f).await;

        let csv_path = f.reports.export_gradebook(CourseId(5)).await.unwrap();
        assert_eq!(
            csv_path,
            f.dir.path().join("reports").join("gradebook_5_BIO_150.csv")
        );
        let csv = tokio::fs::read_to_string(&csv_path).await.unwrap();
        assert_eq!(csv.lines().count(), 5);

        let md_path = f.reports.write_course_report(CourseId(5)).await.unwrap();
        let md = tokio::fs::read_to_string(&md_path).await.unwrap();
        assert!(md.starts_with("# Course Report: BIO/150 - Cell Biology"));
        assert!(md.contains("- Average final grade: 70.00"));
        assert!(md.contains("| Dropped | 1 |"));
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.reports.course_report(CourseId(404)).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
