//! academic-records: enrollment lifecycle, grade and attendance ledgers, course capacity.
//! Hexagonal layout: pure domain, outbound ports, use cases, adapters.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
