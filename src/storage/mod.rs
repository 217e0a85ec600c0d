//! Storage abstractions for fingerprint snapshots.
//!
//! Snapshots are the filtered page content a fingerprint was computed from,
//! written for human inspection and diffing. They are never read back to
//! answer a fingerprint request.
//!
//! ## Directory Structure
//!
//! ```text
//! snapshots/
//! ├── 3f9a1c-body,nonce.html
//! └── 08be52.json
//! ```

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FingerprintRecord;

// Re-export for convenience
pub use local::{LocalStorage, write_atomic};

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist the filtered content of a successful record, named by its
    /// fingerprint. Failed records are not persisted and yield `None`.
    async fn save_snapshot(&self, record: &FingerprintRecord) -> Result<Option<PathBuf>>;
}
