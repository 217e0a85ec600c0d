// src/models/mod.rs

//! Domain models for docdrift.
//!
//! Configuration and the records exchanged between the fetcher, the
//! fingerprint cache and the reconciler.

mod config;
mod record;

// Re-export all public types
pub use config::{Config, FetcherConfig, ReconcileConfig, ScanConfig};
pub use record::{
    CacheKey, DIGEST_LEN, FingerprintRecord, Location, ReconciliationRecord, StoredFingerprint,
    TagOccurrence, content_digest, format_fingerprint,
};
