// src/services/reconciler.rs

//! Annotation reconciler.
//!
//! Compares the fingerprints stored in a file's annotations with freshly
//! computed ones and, when enabled, rewrites stale annotations in memory.
//! Callers write the returned content back once per file.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use regex::{Regex, RegexBuilder};

use crate::error::{AppError, Result};
use crate::models::{ReconciliationRecord, TagOccurrence};
use crate::services::FingerprintCache;

/// Result of reconciling one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub records: Vec<ReconciliationRecord>,
    /// File content after rewriting (unchanged when rewriting is disabled)
    pub content: String,
    pub changed: bool,
}

/// Drives the fingerprint cache for the annotations of a file.
pub struct Reconciler {
    cache: Arc<FingerprintCache>,
    tag_name: String,
    update_files: bool,
}

impl Reconciler {
    pub fn new(cache: Arc<FingerprintCache>, tag_name: impl Into<String>) -> Self {
        Self {
            cache,
            tag_name: tag_name.into(),
            update_files: false,
        }
    }

    /// Enable or disable in-place rewriting of stale annotations.
    pub fn update_files(mut self, enabled: bool) -> Self {
        self.update_files = enabled;
        self
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Reconcile all annotations of one file.
    ///
    /// Occurrences are checked concurrently; those sharing a URL and filter
    /// list share one fetch through the cache.
    pub async fn reconcile(
        &self,
        path: &Path,
        occurrences: &[TagOccurrence],
        content: &str,
    ) -> Result<Reconciliation> {
        if let Some(bad) = occurrences.iter().find(|o| o.identifier.trim().is_empty()) {
            return Err(AppError::annotation(
                path,
                format!("annotation at {} has no identifier", bad.location),
            ));
        }

        let records = join_all(occurrences.iter().map(|occurrence| async move {
            let current = self
                .cache
                .get_fingerprint(&occurrence.identifier, &occurrence.requested_filters())
                .await;
            ReconciliationRecord::new(occurrence, &current)
        }))
        .await;

        let rewritten = if self.update_files {
            rewrite_annotations(content, &self.tag_name, &records)?
        } else {
            content.to_string()
        };

        Ok(Reconciliation {
            changed: rewritten != content,
            content: rewritten,
            records,
        })
    }
}

/// Replace stale fingerprints in `content`.
///
/// A record is applied only when its document was fetched and the stored
/// fingerprint differs; failed checks leave the annotation untouched. The
/// annotation line must carry the tag, the stored fingerprint and the
/// identifier (case-insensitive). Matches are collected against the original
/// text, so a fresh fingerprint is never rewritten again by another record.
pub fn rewrite_annotations(
    content: &str,
    tag_name: &str,
    records: &[ReconciliationRecord],
) -> Result<String> {
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    for record in records.iter().filter(|r| r.needs_update()) {
        let pattern = annotation_pattern(tag_name, &record.saved_fingerprint, &record.external_source)?;
        for caps in pattern.captures_iter(content) {
            let (Some(whole), Some(end)) = (caps.get(0), caps.name("end")) else {
                continue;
            };
            edits.push((
                whole.start(),
                whole.end(),
                format!(
                    "@{} {{{}}} {}{}",
                    tag_name,
                    record.current_fingerprint,
                    record.external_source,
                    end.as_str()
                ),
            ));
        }
    }
    edits.sort_by_key(|(start, _, _)| *start);

    let mut result = String::with_capacity(content.len());
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        // Overlapping matches come from two records on the same annotation.
        if start < cursor {
            continue;
        }
        result.push_str(&content[cursor..start]);
        result.push_str(&replacement);
        cursor = end;
    }
    result.push_str(&content[cursor..]);
    Ok(result)
}

fn annotation_pattern(tag_name: &str, stored: &str, identifier: &str) -> Result<Regex> {
    let tag = regex::escape(tag_name);
    let url = regex::escape(identifier);
    let pattern = if stored.trim().is_empty() {
        format!(r"@{tag}(?:[ \t]*\{{[ \t]*\}})?[ \t]+{url}(?P<end>\s|\*|-->|$)")
    } else {
        let stored = regex::escape(stored.trim());
        format!(r"@{tag}[ \t]*\{{[ \t]*{stored}[ \t]*\}}[ \t]*{url}(?P<end>\s|\*|-->|$)")
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|e| AppError::validation(format!("annotation pattern for {identifier}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterRegistry;
    use crate::models::{Location, content_digest};
    use crate::services::testing::StaticFetcher;

    const URL: &str = "https://docs.example.com/auth";
    const PAGE: &str = "<html><body>Hi<script nonce=\"x\">y</script></body></html>";

    fn reconciler(fetcher: StaticFetcher, update: bool) -> Reconciler {
        let cache = FingerprintCache::new(
            Arc::new(fetcher),
            Arc::new(FilterRegistry::with_builtin()),
        );
        Reconciler::new(Arc::new(cache), "ExternalDocSource").update_files(update)
    }

    fn occurrence(line: usize, url: &str, stored: &str) -> TagOccurrence {
        TagOccurrence::new(Location::new("src/auth.ts", line), url, stored)
    }

    fn source(stored: &str) -> String {
        format!(
            "/**\n * Signs a request.\n * @ExternalDocSource {{{stored}}} {URL}\n */\nexport function sign() {{}}\n"
        )
    }

    #[tokio::test]
    async fn test_matching_fingerprint_with_filters() {
        let current = format!("{}-body,nonce", content_digest("<body>Hi</body>"));
        let content = source(&current);
        let r = reconciler(StaticFetcher::with_page(URL, PAGE), true);

        let result = r
            .reconcile(Path::new("src/auth.ts"), &[occurrence(3, URL, &current)], &content)
            .await
            .unwrap();

        assert!(result.records[0].matches);
        assert!(result.records[0].checked);
        assert!(!result.changed);
        assert_eq!(result.content, content);
    }

    #[tokio::test]
    async fn test_body_only_fingerprint_matches() {
        let page = "<html><body>Hi</body></html>";
        let stored = format!("{}-body", content_digest("<body>Hi</body>"));
        let r = reconciler(StaticFetcher::with_page(URL, page), false);

        let result = r
            .reconcile(Path::new("src/auth.ts"), &[occurrence(3, URL, &stored)], &source(&stored))
            .await
            .unwrap();
        assert!(result.records[0].matches);
    }

    #[tokio::test]
    async fn test_mismatch_is_rewritten() {
        let content = source("abc123");
        let r = reconciler(StaticFetcher::with_page(URL, PAGE), true);

        let result = r
            .reconcile(Path::new("src/auth.ts"), &[occurrence(3, URL, "abc123")], &content)
            .await
            .unwrap();

        let record = &result.records[0];
        let expected = content_digest(PAGE);
        assert!(!record.matches);
        assert_eq!(record.saved_fingerprint, "abc123");
        assert_eq!(record.current_fingerprint, expected);
        assert!(result.changed);
        assert_eq!(result.content, source(&expected));
    }

    #[tokio::test]
    async fn test_mismatch_not_rewritten_when_disabled() {
        let content = source("abc123");
        let r = reconciler(StaticFetcher::with_page(URL, PAGE), false);

        let result = r
            .reconcile(Path::new("src/auth.ts"), &[occurrence(3, URL, "abc123")], &content)
            .await
            .unwrap();

        assert!(!result.records[0].matches);
        assert!(!result.changed);
        assert_eq!(result.content, content);
    }

    #[tokio::test]
    async fn test_failed_fetch_never_overwrites_annotation() {
        let content = source("abc123-body");
        let r = reconciler(StaticFetcher::default(), true);

        let result = r
            .reconcile(Path::new("src/auth.ts"), &[occurrence(3, URL, "abc123-body")], &content)
            .await
            .unwrap();

        let record = &result.records[0];
        assert!(!record.checked);
        assert!(!record.matches);
        assert!(record.current_fingerprint.starts_with("BAD URL"));
        assert!(!result.changed);
        assert_eq!(result.content, content);
    }

    #[tokio::test]
    async fn test_batch_rewrites_each_annotation_once() {
        let other = "https://docs.example.com/tokens";
        let content = format!(
            "// @ExternalDocSource {{old111-body}} {URL}\nfn a() {{}}\n\
             // @externaldocsource {{old222}} {other}\nfn b() {{}}\n\
             // @ExternalDocSource {{old333}} {URL}\nfn c() {{}}\n"
        );
        let mut fetcher = StaticFetcher::with_page(URL, PAGE);
        fetcher.add_page(other, "<p>tokens</p>");
        let r = reconciler(fetcher, true);

        let occurrences = [
            occurrence(1, URL, "old111-body"),
            occurrence(3, other, "old222"),
            occurrence(5, URL, "old333"),
        ];
        let result = r
            .reconcile(Path::new("src/lib.rs"), &occurrences, &content)
            .await
            .unwrap();

        let body = format!("{}-body", content_digest("<body>Hi<script nonce=\"x\">y</script></body>"));
        let raw = content_digest(PAGE);
        let tokens = content_digest("<p>tokens</p>");
        assert_eq!(
            result.content,
            format!(
                "// @ExternalDocSource {{{body}}} {URL}\nfn a() {{}}\n\
                 // @ExternalDocSource {{{tokens}}} {other}\nfn b() {{}}\n\
                 // @ExternalDocSource {{{raw}}} {URL}\nfn c() {{}}\n"
            )
        );
    }

    #[tokio::test]
    async fn test_shared_key_fetched_once_per_batch() {
        let fetcher = Arc::new(StaticFetcher::with_page(URL, PAGE));
        let cache = Arc::new(FingerprintCache::new(
            fetcher.clone(),
            Arc::new(FilterRegistry::with_builtin()),
        ));
        let r = Reconciler::new(cache, "ExternalDocSource");

        let occurrences: Vec<_> = (1..=5).map(|line| occurrence(line, URL, "abc123")).collect();
        r.reconcile(Path::new("src/auth.ts"), &occurrences, "").await.unwrap();

        assert_eq!(fetcher.total(), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier_is_parse_error() {
        let r = reconciler(StaticFetcher::default(), true);
        let err = r
            .reconcile(Path::new("src/auth.ts"), &[occurrence(3, "  ", "abc123")], "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AnnotationParse { .. }));
    }

    #[test]
    fn test_rewrite_ignores_other_identifiers() {
        let content = "* @ExternalDocSource {abc123} https://docs.example.com/auth-v2\n";
        let record = stale(1, "abc123", "def456");
        let result = rewrite_annotations(content, "ExternalDocSource", &[record]).unwrap();
        assert_eq!(result, content);
    }

    fn stale(line: usize, stored: &str, current: &str) -> ReconciliationRecord {
        ReconciliationRecord {
            location: Location::new("a.ts", line),
            base_name: "a.ts".into(),
            external_source: URL.into(),
            saved_fingerprint: stored.into(),
            current_fingerprint: current.into(),
            checked: true,
            matches: false,
        }
    }

    #[test]
    fn test_rewrite_does_not_chain_fresh_fingerprints() {
        let content = format!(
            "// @ExternalDocSource {{aaa111}} {URL}\n// @ExternalDocSource {{bbb222}} {URL}\n"
        );
        let records = [stale(1, "aaa111", "bbb222"), stale(2, "bbb222", "ccc333")];

        let result = rewrite_annotations(&content, "ExternalDocSource", &records).unwrap();
        assert_eq!(
            result,
            format!("// @ExternalDocSource {{bbb222}} {URL}\n// @ExternalDocSource {{ccc333}} {URL}\n")
        );
    }

    #[tokio::test]
    async fn test_html_comment_annotation_is_rewritten() {
        let path = Path::new("docs/auth.html");
        let content = format!("<!-- @ExternalDocSource {{abc123}} {URL}-->\n<p>Auth</p>\n");
        let occurrences =
            crate::pipeline::extract_occurrences(path, &content, "ExternalDocSource").unwrap();
        let r = reconciler(StaticFetcher::with_page(URL, PAGE), true);

        let result = r.reconcile(path, &occurrences, &content).await.unwrap();

        let expected = content_digest(PAGE);
        assert!(result.changed);
        assert_eq!(
            result.content,
            format!("<!-- @ExternalDocSource {{{expected}}} {URL}-->\n<p>Auth</p>\n")
        );
    }

    #[test]
    fn test_rewrite_empty_stored_value() {
        let content = "* @ExternalDocSource https://docs.example.com/auth */\n";
        let record = stale(1, "", "def456");
        let result = rewrite_annotations(content, "ExternalDocSource", &[record]).unwrap();
        assert_eq!(
            result,
            "* @ExternalDocSource {def456} https://docs.example.com/auth */\n"
        );
    }
}
