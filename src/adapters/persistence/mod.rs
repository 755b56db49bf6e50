//! Persistence adapters. Both implement EnrollmentRepoPort and CourseDirectoryPort.

pub mod json_store;
pub mod sqlite_repo;

pub use json_store::JsonStore;
pub use sqlite_repo::SqliteRepo;
