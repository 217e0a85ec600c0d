// src/pipeline/check.rs

//! Full check run over a set of source roots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::filters::FilterRegistry;
use crate::models::{Config, ReconciliationRecord};
use crate::pipeline::extract::extract_occurrences;
use crate::pipeline::scan::discover_sources;
use crate::services::{Fetcher, FingerprintCache, HttpFetcher, Reconciler};
use crate::storage::{LocalStorage, write_atomic};

/// Summary of a check run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub records: Vec<ReconciliationRecord>,
    pub files_scanned: usize,
    pub files_updated: usize,
    pub files_failed: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl CheckSummary {
    /// Annotations whose document changed since the stored fingerprint.
    pub fn mismatches(&self) -> impl Iterator<Item = &ReconciliationRecord> {
        self.records.iter().filter(|r| r.checked && !r.matches)
    }

    /// Annotations whose document could not be checked.
    pub fn errors(&self) -> impl Iterator<Item = &ReconciliationRecord> {
        self.records.iter().filter(|r| !r.checked)
    }

    /// True when every annotation matched and every file was readable.
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.records.iter().all(|r| r.matches)
    }
}

/// What happened to a single file.
struct FileOutcome {
    records: Vec<ReconciliationRecord>,
    updated: bool,
}

/// Run a check with the HTTP fetcher and the built-in filters.
pub async fn run_check(config: &Config, roots: &[PathBuf]) -> Result<CheckSummary> {
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let filters = Arc::new(FilterRegistry::with_builtin());
    run_check_with(config, roots, fetcher, filters).await
}

/// Run a check with a caller-supplied fetcher and filter registry.
pub async fn run_check_with(
    config: &Config,
    roots: &[PathBuf],
    fetcher: Arc<dyn Fetcher>,
    filters: Arc<FilterRegistry>,
) -> Result<CheckSummary> {
    config.validate()?;
    let start_time = Utc::now();

    let mut cache = FingerprintCache::new(fetcher, filters);
    if let Some(dir) = &config.reconcile.snapshot_dir {
        cache = cache.with_snapshots(Arc::new(LocalStorage::new(dir)));
    }
    let reconciler = Reconciler::new(Arc::new(cache), config.reconcile.tag_name.clone())
        .update_files(config.reconcile.update_files);

    let files = discover_sources(roots, &config.scan);
    log::info!("Checking {} source files", files.len());

    let mut summary = CheckSummary {
        records: Vec::new(),
        files_scanned: files.len(),
        files_updated: 0,
        files_failed: 0,
        start_time,
        end_time: start_time,
    };

    let reconciler = &reconciler;
    let mut outcomes = stream::iter(files)
        .map(|path| async move {
            let result = check_file(reconciler, &path).await;
            (path, result)
        })
        .buffer_unordered(config.reconcile.max_concurrent.max(1));

    while let Some((path, result)) = outcomes.next().await {
        match result {
            Ok(outcome) => {
                if outcome.updated {
                    summary.files_updated += 1;
                    log::info!("Updated annotations in {}", path.display());
                }
                summary.records.extend(outcome.records);
            }
            Err(error) => {
                summary.files_failed += 1;
                log::warn!("Skipping {}: {}", path.display(), error);
            }
        }
    }

    summary.records.sort_by(|a, b| {
        (&a.location.path, a.location.line).cmp(&(&b.location.path, b.location.line))
    });
    summary.end_time = Utc::now();

    log::info!(
        "Checked {} annotations: {} changed, {} unreachable, {} files updated, {} files failed",
        summary.records.len(),
        summary.mismatches().count(),
        summary.errors().count(),
        summary.files_updated,
        summary.files_failed
    );

    Ok(summary)
}

/// Read, reconcile and (if needed) write back one file.
async fn check_file(reconciler: &Reconciler, path: &Path) -> Result<FileOutcome> {
    let bytes = tokio::fs::read(path).await?;
    let content = String::from_utf8(bytes)
        .map_err(|_| AppError::annotation(path, "file content is not valid UTF-8"))?;

    let occurrences = extract_occurrences(path, &content, reconciler.tag_name())?;
    if occurrences.is_empty() {
        return Ok(FileOutcome {
            records: Vec::new(),
            updated: false,
        });
    }
    log::debug!("{}: {} annotations", path.display(), occurrences.len());

    let reconciliation = reconciler.reconcile(path, &occurrences, &content).await?;
    if reconciliation.changed {
        write_atomic(path, reconciliation.content.as_bytes()).await?;
    }

    Ok(FileOutcome {
        records: reconciliation.records,
        updated: reconciliation.changed,
    })
}
