//! Infrastructure adapters. Implement outbound ports.
//!
//! SQLite and JSON persistence, CSV export. Map errors to DomainError.

pub mod export;
pub mod persistence;
