//! Service layer for docdrift.
//!
//! This module contains the business logic for:
//! - Document fetching (`HttpFetcher`)
//! - Deduplicated fingerprinting (`FingerprintCache`)
//! - Annotation reconciliation (`Reconciler`)

mod cache;
mod fetcher;
mod reconciler;

pub use cache::FingerprintCache;
pub use fetcher::{FetchedPage, Fetcher, HttpFetcher};
pub use reconciler::{Reconciliation, Reconciler, rewrite_annotations};
