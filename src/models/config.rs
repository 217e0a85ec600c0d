//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP fetching behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Annotation reconciliation settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Source discovery settings
    #[serde(default)]
    pub scan: ScanConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration strictly and validate it.
    pub fn load_validated(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.reconcile.max_concurrent == 0 {
            return Err(AppError::validation("reconcile.max_concurrent must be > 0"));
        }
        let tag = self.reconcile.tag_name.trim();
        if tag.is_empty() {
            return Err(AppError::validation("reconcile.tag_name is empty"));
        }
        if tag.chars().any(|c| c.is_whitespace() || c == '@') {
            return Err(AppError::validation(
                "reconcile.tag_name must not contain whitespace or '@'",
            ));
        }
        if self.scan.extensions.is_empty() {
            return Err(AppError::validation("No scan extensions defined"));
        }
        Ok(())
    }
}

/// HTTP client settings shared by both fetch strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept header
    #[serde(default = "defaults::accept")]
    pub accept: String,

    /// Accept-Language header
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retry through the challenge-aware client when the primary fetch fails
    #[serde(default = "defaults::fallback")]
    pub fallback: bool,

    /// Pause before repeating a request answered with a challenge status
    #[serde(default = "defaults::challenge_delay")]
    pub challenge_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept: defaults::accept(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            fallback: defaults::fallback(),
            challenge_delay_ms: defaults::challenge_delay(),
        }
    }
}

/// Reconciliation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Annotation tag name, without the leading `@`
    #[serde(default = "defaults::tag_name")]
    pub tag_name: String,

    /// Rewrite stale fingerprints in place
    #[serde(default = "defaults::update_files")]
    pub update_files: bool,

    /// Directory for filtered snapshots, named by fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,

    /// Maximum number of files processed concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tag_name: defaults::tag_name(),
            update_files: defaults::update_files(),
            snapshot_dir: None,
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Source discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extensions to scan for annotations
    #[serde(default = "defaults::extensions")]
    pub extensions: Vec<String>,

    /// Directory or file names to skip (matched against whole path components)
    #[serde(default = "defaults::exclude")]
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: defaults::extensions(),
            exclude: defaults::exclude(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
            .into()
    }
    pub fn accept() -> String {
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into()
    }
    pub fn accept_language() -> String {
        "en-US,en;q=0.9".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn fallback() -> bool {
        true
    }
    pub fn challenge_delay() -> u64 {
        1500
    }

    // Reconcile defaults
    pub fn tag_name() -> String {
        "ExternalDocSource".into()
    }
    pub fn update_files() -> bool {
        true
    }
    pub fn max_concurrent() -> usize {
        8
    }

    // Scan defaults
    pub fn extensions() -> Vec<String> {
        ["ts", "tsx", "js", "jsx", "mjs", "rs", "go", "py", "java", "kt", "cs"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
    pub fn exclude() -> Vec<String> {
        vec!["node_modules".into(), "target".into(), "dist".into()]
    }
}
