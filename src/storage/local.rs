//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── <fingerprint>.<ext>    # Filtered snapshot behind a fingerprint
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::FingerprintRecord;
use crate::storage::SnapshotStore;

/// Distinguishes temp files of concurrent writes to the same path.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write bytes atomically (write to temp, then rename).
///
/// Missing parent directories are created; existing ones are fine.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(
        ".{}-{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp = PathBuf::from(tmp_name);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Snapshot key for a record.
    fn snapshot_key(record: &FingerprintRecord) -> String {
        format!("{}.{}", record.fingerprint, record.snapshot_extension())
    }

    /// Write bytes under a key.
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn save_snapshot(&self, record: &FingerprintRecord) -> Result<Option<PathBuf>> {
        if !record.success {
            return Ok(None);
        }
        let key = Self::snapshot_key(record);
        let path = self.write_bytes(&key, record.content.as_bytes()).await?;
        log::debug!("Snapshot written to {}", path.display());
        Ok(Some(path))
    }
}
