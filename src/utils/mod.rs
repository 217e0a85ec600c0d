//! Utility functions and helpers.

pub mod http;

use sha2::{Digest, Sha256};
use url::Url;

/// Lowercase hex SHA-256 of `input`, truncated to `len` characters.
pub fn sha256_prefix(input: &[u8], len: usize) -> String {
    let mut hex = hex::encode(Sha256::digest(input));
    hex.truncate(len);
    hex
}

/// Parse an external identifier as an http(s) URL.
pub fn parse_http_url(identifier: &str) -> Option<Url> {
    Url::parse(identifier)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}
