//! Annotation and fingerprint records.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::sha256_prefix;

/// Number of hex characters kept from the content digest.
pub const DIGEST_LEN: usize = 6;

/// Number of hex characters kept from the cache key digest.
const CACHE_KEY_LEN: usize = 16;

/// Where an annotation was found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based line number, 0 when unknown
    pub line: usize,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    /// File name component of the path.
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}", self.path.display(), self.line)
        } else {
            write!(f, "{}", self.path.display())
        }
    }
}

/// A single annotation binding a symbol to an external document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagOccurrence {
    pub location: Location,
    /// External identifier (the document URL)
    pub identifier: String,
    /// Fingerprint string recorded at last review, possibly empty
    pub stored: String,
}

impl TagOccurrence {
    pub fn new(
        location: Location,
        identifier: impl Into<String>,
        stored: impl Into<String>,
    ) -> Self {
        Self {
            location,
            identifier: identifier.into(),
            stored: stored.into(),
        }
    }

    /// Filters to apply when re-checking, as encoded in the stored fingerprint.
    pub fn requested_filters(&self) -> Vec<String> {
        StoredFingerprint::parse(&self.stored).filters
    }
}

/// A stored fingerprint string split into its two optional parts.
///
/// The wire format is `<digest>` or `<digest>-<filter>,<filter>,...`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredFingerprint {
    pub digest: String,
    pub filters: Vec<String>,
}

impl StoredFingerprint {
    /// Parse a stored fingerprint. Never fails: a missing or malformed
    /// suffix yields an empty filter list.
    pub fn parse(stored: &str) -> Self {
        let stored = stored.trim();
        match stored.split_once('-') {
            Some((digest, suffix)) => Self {
                digest: digest.to_string(),
                filters: suffix
                    .split(',')
                    .map(str::trim)
                    .filter(|name| is_filter_name(name))
                    .map(str::to_string)
                    .collect(),
            },
            None => Self {
                digest: stored.to_string(),
                filters: Vec::new(),
            },
        }
    }
}

fn is_filter_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Render a fingerprint string from a digest and the filters that changed the content.
pub fn format_fingerprint(digest: &str, applied: &[String]) -> String {
    if applied.is_empty() {
        digest.to_string()
    } else {
        format!("{}-{}", digest, applied.join(","))
    }
}

/// Short content digest used in fingerprints.
pub fn content_digest(content: &str) -> String {
    sha256_prefix(content.as_bytes(), DIGEST_LEN)
}

/// Cache key for a (url, requested filter list) pair.
///
/// Filter order is significant: the same set in a different order is a
/// different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(url: &str, filters: &[String]) -> Self {
        let material = format!("{}\n{}", url, filters.join(","));
        Self(sha256_prefix(material.as_bytes(), CACHE_KEY_LEN))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of fingerprinting one (url, filter list) pair.
///
/// Failed records carry a diagnostic in `fingerprint` instead of a digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FingerprintRecord {
    /// Requested filters that actually changed the content, in requested order
    pub applied_filters: Vec<String>,
    /// Filtered content snapshot (partially filtered when a filter failed)
    pub content: String,
    pub fingerprint: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FingerprintRecord {
    /// Build a successful record from filtered content.
    pub fn computed(
        content: String,
        applied_filters: Vec<String>,
        content_type: Option<String>,
    ) -> Self {
        let fingerprint = format_fingerprint(&content_digest(&content), &applied_filters);
        Self {
            applied_filters,
            content,
            fingerprint,
            success: true,
            error: None,
            content_type,
        }
    }

    /// Build a failed record. `diagnostic` replaces the digest.
    pub fn failed(
        diagnostic: impl Into<String>,
        content: String,
        applied_filters: Vec<String>,
    ) -> Self {
        let diagnostic = diagnostic.into();
        Self {
            applied_filters,
            content,
            fingerprint: diagnostic.clone(),
            success: false,
            error: Some(diagnostic),
            content_type: None,
        }
    }

    /// File extension for the persisted snapshot.
    pub fn snapshot_extension(&self) -> &'static str {
        let Some(content_type) = self.content_type.as_deref() else {
            return "txt";
        };
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("html") {
            "html"
        } else if content_type.contains("json") {
            "json"
        } else if content_type.contains("xml") {
            "xml"
        } else if content_type.contains("javascript") {
            "js"
        } else {
            "txt"
        }
    }
}

/// Outcome of comparing one annotation against its current fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationRecord {
    pub location: Location,
    pub base_name: String,
    pub external_source: String,
    pub saved_fingerprint: String,
    /// Current fingerprint, or a diagnostic when `checked` is false
    pub current_fingerprint: String,
    /// Whether the document could be fetched and fingerprinted
    pub checked: bool,
    pub matches: bool,
}

impl ReconciliationRecord {
    pub fn new(occurrence: &TagOccurrence, current: &FingerprintRecord) -> Self {
        Self {
            location: occurrence.location.clone(),
            base_name: occurrence.location.base_name(),
            external_source: occurrence.identifier.clone(),
            saved_fingerprint: occurrence.stored.clone(),
            current_fingerprint: current.fingerprint.clone(),
            checked: current.success,
            matches: current.success && occurrence.stored == current.fingerprint,
        }
    }

    /// Whether the stored annotation should be rewritten.
    pub fn needs_update(&self) -> bool {
        self.checked && !self.matches
    }
}
