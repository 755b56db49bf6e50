//! Port traits. API boundaries for the hexagon.
//!
//! Outbound only: the application calls into persistence and the course
//! directory. Callers (the binary, an API layer) use the services directly.

pub mod outbound;

pub use outbound::{CourseDirectoryPort, EnrollmentRepoPort};
