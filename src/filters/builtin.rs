//! Built-in content filters.
//!
//! Each filter strips page content that changes between loads without the
//! documentation itself changing. A filter that does not find the structure
//! it looks for returns its input unchanged, and applying a filter to its own
//! output is a no-op.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};

static BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b.*?</body[^>]*>").expect("valid body regex"));

static NONCE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<([a-z][a-z0-9-]*)\b[^<>]*?\b(?:nonce|csrfmiddlewaretoken|csrf[-_]token)\b[^<>]*>")
        .expect("valid nonce regex")
});

static SCRIPT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</script\s*>").expect("valid script regex"));

static STYLE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</style\s*>").expect("valid style regex"));

static README_UPDATED_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(?:slug)?updatedAt".*?,"#).expect("valid readmeio regex")
});

static CLOUDFLARE_CHALLENGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<script>.*?challenge-platform.*?</script>").expect("valid cloudflare regex")
});

static ZENDESK_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!-- (v\d+) -->").expect("valid zendesk regex"));

static ZENDESK_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:script|link).*?zdassets\.com/hc/\w*assets/.*(?:/script)?>")
        .expect("valid zendesk asset regex")
});

static DATADOG_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)DD_RUM[\s\S]*?version: '(.*?)',").expect("valid datadog regex")
});

/// Name and function of every built-in filter.
pub fn all() -> [(&'static str, fn(&str) -> String); 6] {
    [
        ("body", body),
        ("nonce", nonce),
        ("readmeio", readmeio),
        ("cloudflare", cloudflare),
        ("zendesk", zendesk),
        ("datadog", datadog),
    ]
}

/// Keep only the first `<body>...</body>` region.
pub fn body(content: &str) -> String {
    match BODY.find(content) {
        Some(m) => m.as_str().to_string(),
        None => content.to_string(),
    }
}

/// Remove tags carrying a nonce or CSRF token. Script and style elements are
/// removed together with their contents.
pub fn nonce(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    while let Some(caps) = NONCE_TAG.captures_at(content, cursor) {
        let Some(tag) = caps.get(0) else { break };
        out.push_str(&content[cursor..tag.start()]);

        let close = match caps[1].to_ascii_lowercase().as_str() {
            _ if tag.as_str().ends_with("/>") => None,
            "script" => Some(&*SCRIPT_CLOSE),
            "style" => Some(&*STYLE_CLOSE),
            _ => None,
        };
        cursor = close
            .and_then(|close| close.find_at(content, tag.end()))
            .map_or(tag.end(), |m| m.end());
    }

    out.push_str(&content[cursor..]);
    out
}

/// Replace a readme.io page with its embedded API definition, minus the
/// volatile update timestamps.
pub fn readmeio(content: &str) -> String {
    if !content.contains("data-initial-props") {
        return content.to_string();
    }
    let Ok(selector) = Selector::parse("script[data-initial-props]") else {
        return content.to_string();
    };

    let document = Html::parse_document(content);
    // Attribute values come back entity-decoded.
    let props = document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("data-initial-props"))
        .map(str::to_string);

    match props {
        Some(props) => README_UPDATED_AT.replace_all(&props, "").into_owned(),
        None => content.to_string(),
    }
}

/// Remove the inline anti-bot challenge script.
pub fn cloudflare(content: &str) -> String {
    CLOUDFLARE_CHALLENGE.replace_all(content, "").into_owned()
}

/// Strip the Zendesk build version and its cache-busted asset tags.
pub fn zendesk(content: &str) -> String {
    let versions: BTreeSet<&str> = ZENDESK_VERSION
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if versions.is_empty() {
        return content.to_string();
    }

    let mut result = content.to_string();
    for version in versions {
        result = strip_all(&result, version);
    }
    ZENDESK_ASSET.replace_all(&result, "").into_owned()
}

/// Strip the version string passed to the Datadog RUM SDK.
pub fn datadog(content: &str) -> String {
    let version = DATADOG_VERSION
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|v| !v.is_empty());

    match version {
        Some(version) => strip_all(content, version),
        None => content.to_string(),
    }
}

/// Remove every case-insensitive occurrence of a literal.
fn strip_all(content: &str, literal: &str) -> String {
    match RegexBuilder::new(&regex::escape(literal))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.replace_all(content, "").into_owned(),
        Err(e) => {
            log::debug!("Skipping strip of {literal:?}: {e}");
            content.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const README_PAGE: &str = concat!(
        "<html><head></head><body><div id=\"app\"></div>",
        "<script id=\"ssr-props\" data-initial-props=\"{&quot;title&quot;:&quot;Auth&quot;,",
        "&quot;updatedAt&quot;:&quot;2024-05-01T10:00:00Z&quot;,",
        "&quot;slugUpdatedAt&quot;:&quot;2024-05-01T10:00:00Z&quot;,",
        "&quot;body&quot;:&quot;Use a &lt;token&gt;&quot;}\"></script></body></html>"
    );

    const ZENDESK_PAGE: &str = "<!-- v12345 -->\n<html><head>\n\
        <script src=\"https://static.zdassets.com/hc/assets/en-us.abc123.js\"></script>\n\
        <link rel=\"stylesheet\" href=\"https://theme.zdassets.com/hc/themeassets/x.css\">\n\
        <meta name=\"build\" content=\"v12345\">\n</head><body>Docs</body></html>";

    const DATADOG_PAGE: &str = "<script>window.DD_RUM && window.DD_RUM.init({\n\
        clientToken: 'pub',\n  version: '4.2.1-rc7',\n});</script>\n\
        <link href=\"/static/app-4.2.1-rc7.css\"><body>Docs</body>";

    const CLOUDFLARE_PAGE: &str = "<body>Docs<script>(function(){var s='/cdn-cgi/challenge-platform/h/b/scripts/jsd/abc.js';})();</script></body>";

    fn assert_idempotent(name: &str, f: fn(&str) -> String, input: &str) {
        let once = f(input);
        assert_eq!(f(&once), once, "{name} is not idempotent");
    }

    #[test]
    fn test_body_extracts_first_body() {
        let page = "<html><head><title>x</title></head><BODY class=\"a\">Hi</body >\n</html>";
        assert_eq!(body(page), "<BODY class=\"a\">Hi</body >");
    }

    #[test]
    fn test_body_without_body_is_unchanged() {
        assert_eq!(body("just text"), "just text");
    }

    #[test]
    fn test_nonce_removes_script_and_contents() {
        let page = "<body>Hi<script nonce=\"x\">y</script></body>";
        assert_eq!(nonce(page), "<body>Hi</body>");
    }

    #[test]
    fn test_nonce_removes_csrf_inputs_only() {
        let page = "<form><input type=\"hidden\" name=\"csrfmiddlewaretoken\" value=\"abc\">\
                    <input name=\"q\"></form>";
        assert_eq!(nonce(page), "<form><input name=\"q\"></form>");
    }

    #[test]
    fn test_nonce_ignores_words_containing_nonce() {
        let page = "<meta name=\"description\" content=\"We announce things\">";
        assert_eq!(nonce(page), page);
    }

    #[test]
    fn test_readmeio_extracts_and_strips_timestamps() {
        let result = readmeio(README_PAGE);
        assert_eq!(result, "{\"title\":\"Auth\",\"body\":\"Use a <token>\"}");
    }

    #[test]
    fn test_readmeio_without_props_is_unchanged() {
        assert_eq!(readmeio("<body>Docs</body>"), "<body>Docs</body>");
    }

    #[test]
    fn test_cloudflare_removes_challenge() {
        assert_eq!(cloudflare(CLOUDFLARE_PAGE), "<body>Docs</body>");
    }

    #[test]
    fn test_zendesk_strips_version_and_assets() {
        let result = zendesk(ZENDESK_PAGE);
        assert!(!result.contains("v12345"));
        assert!(!result.contains("zdassets"));
        assert!(result.contains("<body>Docs</body>"));
    }

    #[test]
    fn test_zendesk_without_version_is_unchanged() {
        let page = "<script src=\"https://static.zdassets.com/hc/assets/a.js\"></script>";
        assert_eq!(zendesk(page), page);
    }

    #[test]
    fn test_datadog_strips_version() {
        let result = datadog(DATADOG_PAGE);
        assert!(!result.contains("4.2.1-rc7"));
        assert!(result.contains("version: '',"));
        assert!(result.contains("/static/app-.css"));
    }

    #[test]
    fn test_all_filters_idempotent() {
        let samples = [
            README_PAGE,
            ZENDESK_PAGE,
            DATADOG_PAGE,
            CLOUDFLARE_PAGE,
            "<html><body>Hi<script nonce=\"x\">y</script></body></html>",
            "plain text without markup",
            "",
        ];
        for (name, f) in all() {
            for sample in samples {
                assert_idempotent(name, f, sample);
            }
        }
    }
}
