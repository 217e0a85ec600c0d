//! Pipeline entry points for docdrift runs.
//!
//! - `extract_occurrences`: Find annotations in source text
//! - `discover_sources`: Collect source files to scan
//! - `run_check`: Reconcile every annotation under a set of roots

pub mod check;
pub mod extract;
pub mod scan;

pub use check::{CheckSummary, run_check, run_check_with};
pub use extract::extract_occurrences;
pub use scan::discover_sources;
