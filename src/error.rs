// src/error.rs

//! Unified error handling for docdrift.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for docdrift operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Both fetch strategies failed, or the response was unusable
    #[error("{message} ({url})")]
    Fetch { url: String, message: String },

    /// A content filter raised while transforming a page
    #[error("Filter '{filter}' failed: {message}")]
    Filter { filter: String, message: String },

    /// Source content could not be read or its annotations are malformed
    #[error("Annotation parse error in {path}: {message}")]
    AnnotationParse { path: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a filter error.
    pub fn filter(filter: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Filter {
            filter: filter.into(),
            message: message.to_string(),
        }
    }

    /// Message of a fetch error without the URL, or the full error text.
    pub fn reason(&self) -> String {
        match self {
            Self::Fetch { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Create an annotation parse error for a source file.
    pub fn annotation(path: &Path, message: impl fmt::Display) -> Self {
        Self::AnnotationParse {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}
