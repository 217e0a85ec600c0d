// src/pipeline/extract.rs

//! Annotation extraction from source text.
//!
//! Recognizes `@<TagName> {<fingerprint>} <identifier>` on comment lines.
//! The fingerprint braces are optional for annotations not yet reviewed.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Location, TagOccurrence};

/// Line prefixes treated as comments.
const COMMENT_MARKERS: [&str; 7] = ["*", "/*", "//", "#", "--", ";", "<!--"];

/// Trailing comment terminators glued to an identifier.
const COMMENT_TERMINATORS: [&str; 2] = ["*/", "-->"];

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMENT_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

/// Extract every annotation with `tag_name` from `content`.
pub fn extract_occurrences(
    path: &Path,
    content: &str,
    tag_name: &str,
) -> Result<Vec<TagOccurrence>> {
    let marker = format!("@{tag_name}");
    let mut occurrences = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if !is_comment_line(line) {
            continue;
        }
        let line_no = index + 1;

        for (start, _) in line.match_indices(&marker) {
            let rest = &line[start + marker.len()..];
            // `@ExternalDocSourceX` is a different tag.
            if rest
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                continue;
            }
            let (stored, identifier) = parse_annotation(rest)
                .map_err(|message| AppError::annotation(path, format!("line {line_no}: {message}")))?;
            occurrences.push(TagOccurrence::new(
                Location::new(path, line_no),
                identifier,
                stored,
            ));
        }
    }

    Ok(occurrences)
}

/// Split the text after the tag into (stored fingerprint, identifier).
fn parse_annotation(rest: &str) -> std::result::Result<(String, String), &'static str> {
    let mut rest = rest.trim_start();
    let mut stored = String::new();

    if let Some(after_brace) = rest.strip_prefix('{') {
        let Some(end) = after_brace.find('}') else {
            return Err("unterminated '{' in annotation");
        };
        stored = after_brace[..end].trim().to_string();
        rest = after_brace[end + 1..].trim_start();
    }

    let mut identifier = rest.split_whitespace().next().unwrap_or_default();
    for terminator in COMMENT_TERMINATORS {
        identifier = identifier.strip_suffix(terminator).unwrap_or(identifier);
    }
    if identifier.is_empty() || COMMENT_TERMINATORS.contains(&identifier) {
        return Err("annotation has no identifier");
    }

    Ok((stored, identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: &str = "ExternalDocSource";

    fn extract(content: &str) -> Result<Vec<TagOccurrence>> {
        extract_occurrences(Path::new("src/client.ts"), content, TAG)
    }

    #[test]
    fn test_extracts_jsdoc_annotation() {
        let content = "/**\n * Lists users.\n * @ExternalDocSource {3f9a1c-body,nonce} https://docs.example.com/users\n */";
        let found = extract(content).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.line, 3);
        assert_eq!(found[0].stored, "3f9a1c-body,nonce");
        assert_eq!(found[0].identifier, "https://docs.example.com/users");
        assert_eq!(found[0].requested_filters(), vec!["body", "nonce"]);
    }

    #[test]
    fn test_extracts_line_comments_and_unreviewed() {
        let content = "// @ExternalDocSource https://a.example.com\n\
                       # @ExternalDocSource {} https://b.example.com\n\
                       /** @ExternalDocSource {08be52} https://c.example.com */";
        let found = extract(content).unwrap();

        let pairs: Vec<_> = found
            .iter()
            .map(|o| (o.stored.as_str(), o.identifier.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("", "https://a.example.com"),
                ("", "https://b.example.com"),
                ("08be52", "https://c.example.com"),
            ]
        );
    }

    #[test]
    fn test_ignores_code_and_other_tags() {
        let content = "const tag = \"@ExternalDocSource {x} https://a.example.com\";\n\
                       // @ExternalDocSourceLegacy {x} https://b.example.com\n\
                       // @see https://c.example.com";
        assert!(extract(content).unwrap().is_empty());
    }

    #[test]
    fn test_strips_glued_comment_terminator() {
        let found = extract("/* @ExternalDocSource {abc123} https://a.example.com*/").unwrap();
        assert_eq!(found[0].identifier, "https://a.example.com");
    }

    #[test]
    fn test_unterminated_brace_is_parse_error() {
        let err = extract(" * @ExternalDocSource {abc123 https://a.example.com").unwrap_err();
        assert!(matches!(err, AppError::AnnotationParse { .. }));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_missing_identifier_is_parse_error() {
        assert!(extract(" * @ExternalDocSource {abc123}").is_err());
        assert!(extract(" * @ExternalDocSource {abc123} */").is_err());
    }
}
