//! Application use cases. Orchestrate domain logic via ports.

pub mod enrollment_service;
pub mod record_engine;
pub mod report_service;

pub use enrollment_service::EnrollmentService;
pub use record_engine::{AcademicRecordEngine, EnrollmentCommand, EnrollmentSummary};
pub use report_service::{CourseReport, ReportService};
