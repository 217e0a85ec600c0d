// src/services/cache.rs

//! Fingerprint cache.
//!
//! Each distinct (url, requested filters) pair is fetched at most once per
//! cache instance. The first caller inserts a shared pending entry while
//! holding the map lock; every later caller, whether the entry is still in
//! flight or already resolved, awaits that same entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::filters::FilterRegistry;
use crate::models::{CacheKey, FingerprintRecord};
use crate::services::fetcher::Fetcher;
use crate::storage::SnapshotStore;

type PendingRecord = Shared<BoxFuture<'static, Arc<FingerprintRecord>>>;

/// Deduplicating cache of fingerprint records.
pub struct FingerprintCache {
    fetcher: Arc<dyn Fetcher>,
    filters: Arc<FilterRegistry>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    entries: Mutex<HashMap<CacheKey, PendingRecord>>,
}

impl FingerprintCache {
    /// Create a cache over a fetcher and a filter registry.
    pub fn new(fetcher: Arc<dyn Fetcher>, filters: Arc<FilterRegistry>) -> Self {
        Self {
            fetcher,
            filters,
            snapshots: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Persist the filtered content of every successful record.
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Number of distinct keys requested so far.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the fingerprint record for `url` under the requested filters.
    ///
    /// Never fails: fetch and filter errors resolve to a record with
    /// `success == false`.
    pub async fn get_fingerprint(&self, url: &str, filters: &[String]) -> Arc<FingerprintRecord> {
        let key = CacheKey::new(url, filters);
        let pending = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .entry(key)
                .or_insert_with_key(|key| {
                    log::debug!("Fetching {url} with filters {filters:?} (key {key})");
                    self.resolve(url, filters)
                })
                .clone()
        };
        pending.await
    }

    fn resolve(&self, url: &str, filters: &[String]) -> PendingRecord {
        let fetcher = Arc::clone(&self.fetcher);
        let registry = Arc::clone(&self.filters);
        let snapshots = self.snapshots.clone();
        let url = url.to_string();
        let filters = filters.to_vec();

        async move {
            let record = compute(fetcher.as_ref(), &registry, &url, &filters).await;
            if let Some(store) = snapshots {
                if let Err(e) = store.save_snapshot(&record).await {
                    log::warn!("Failed to save snapshot for {url}: {e}");
                }
            }
            Arc::new(record)
        }
        .boxed()
        .shared()
    }
}

/// Fetch, filter and digest one document.
async fn compute(
    fetcher: &dyn Fetcher,
    registry: &FilterRegistry,
    url: &str,
    filters: &[String],
) -> FingerprintRecord {
    let page = match fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            log::warn!("Could not fetch {url}: {e}");
            return FingerprintRecord::failed(
                format!("BAD URL: {}", e.reason()),
                String::new(),
                Vec::new(),
            );
        }
    };

    match registry.apply(&page.body, filters) {
        Ok(filtered) => {
            FingerprintRecord::computed(filtered.content, filtered.applied, page.content_type)
        }
        Err(failure) => {
            log::warn!("Could not filter {url}: {}", failure.error);
            FingerprintRecord::failed(
                format!("Unable to hash page: {}", failure.error),
                failure.partial.content,
                failure.partial.applied,
            )
        }
    }
}
