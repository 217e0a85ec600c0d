//! Content filter registry and pipeline.
//!
//! Filters are applied in the order requested by an annotation. Only the
//! filters that changed the content are reported back, so the fingerprint
//! suffix lists the effective subset of the requested filters.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, Result};

/// A named text transform. Must be idempotent.
pub type FilterFn = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Content after running the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filtered {
    pub content: String,
    /// Requested filters that changed the content, in requested order
    pub applied: Vec<String>,
}

/// A filter raised part-way through the pipeline.
#[derive(Debug)]
pub struct FilterFailure {
    /// Content and applied filters up to the failing filter
    pub partial: Filtered,
    pub error: AppError,
}

/// Mapping from filter name to transform.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in filters.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (name, f) in builtin::all() {
            registry.register(name, move |content: &str| Ok(f(content)));
        }
        registry
    }

    /// Register a filter, replacing any filter of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F) -> &mut Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    /// Merge `overrides` into this registry. Same-named filters are replaced,
    /// all others are kept.
    pub fn merge(&mut self, overrides: FilterRegistry) -> &mut Self {
        self.filters.extend(overrides.filters);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered filter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the requested filters over `content`.
    ///
    /// Unknown names are skipped. A filter whose output equals its input is
    /// not recorded as applied.
    pub fn apply(
        &self,
        content: &str,
        names: &[String],
    ) -> std::result::Result<Filtered, FilterFailure> {
        let mut filtered = Filtered {
            content: content.to_string(),
            applied: Vec::new(),
        };

        for name in names {
            let Some(filter) = self.filters.get(name) else {
                log::debug!("Filter '{name}' is not registered, skipping");
                continue;
            };
            match filter(&filtered.content) {
                Ok(output) if output != filtered.content => {
                    filtered.content = output;
                    filtered.applied.push(name.clone());
                }
                Ok(_) => {}
                Err(error) => {
                    return Err(FilterFailure {
                        partial: filtered,
                        error,
                    });
                }
            }
        }

        Ok(filtered)
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}
