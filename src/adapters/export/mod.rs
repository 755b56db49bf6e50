//! Export adapters. Render read models to files for external tools.

pub mod gradebook_csv;

pub use gradebook_csv::summaries_to_csv;
