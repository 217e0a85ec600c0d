// src/services/fetcher.rs

//! Document fetcher.
//!
//! Fetches raw page text with a browser-like client, falling back to a
//! cookie-keeping client that waits out browser-challenge gateways.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response, StatusCode};

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;
use crate::utils::http::{create_async_client, create_challenge_client};
use crate::utils::{get_domain, parse_http_url};

/// A fetched text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Source of raw document content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the text content behind `url`.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// HTTP fetcher with a primary and a challenge-aware fallback strategy.
pub struct HttpFetcher {
    primary: Client,
    fallback: Option<Client>,
    challenge_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let fallback = if config.fallback {
            Some(create_challenge_client(config)?)
        } else {
            None
        };
        Ok(Self {
            primary: create_async_client(config)?,
            fallback,
            challenge_delay: Duration::from_millis(config.challenge_delay_ms),
        })
    }

    async fn fetch_primary(&self, url: &str) -> Result<FetchedPage> {
        let response = self.primary.get(url).send().await?;
        read_text(url, response).await
    }

    async fn fetch_fallback(&self, client: &Client, url: &str) -> Result<FetchedPage> {
        let response = client.get(url).send().await?;
        if !is_challenge(response.status()) {
            return read_text(url, response).await;
        }

        log::debug!(
            "Challenge response {} from {}, retrying after {:?}",
            response.status(),
            get_domain(url).unwrap_or_default(),
            self.challenge_delay
        );
        // Drain the body so the challenge cookies are committed to the jar.
        let _ = response.bytes().await;
        tokio::time::sleep(self.challenge_delay).await;

        let response = client.get(url).send().await?;
        read_text(url, response).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        if parse_http_url(url).is_none() {
            return Err(AppError::fetch(url, "not an http(s) URL"));
        }

        let primary_error = match self.fetch_primary(url).await {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(AppError::fetch(
                url,
                format!("Failed to fetch url: {}", primary_error.reason()),
            ));
        };

        log::debug!("Primary fetch of {url} failed ({primary_error}), trying fallback");
        match self.fetch_fallback(fallback, url).await {
            Ok(page) => Ok(page),
            Err(fallback_error) => Err(AppError::fetch(
                url,
                format!("Failed to fetch url: {}", fallback_error.reason()),
            )),
        }
    }
}

/// Status codes gateways answer with while a browser challenge is pending.
fn is_challenge(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Whether a declared content type carries text.
fn is_text_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.contains("json")
        || mime.contains("xml")
        || mime.contains("javascript")
}

/// Check status and content type, then decode the body as text.
async fn read_text(url: &str, response: Response) -> Result<FetchedPage> {
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::fetch(url, format!("HTTP status {status}")));
    }

    let content_type = content_type(response.headers());
    if let Some(ct) = content_type.as_deref() {
        if !is_text_type(ct) {
            return Err(AppError::fetch(url, format!("non-text response ({ct})")));
        }
    }

    // Declared text is decoded with its charset; undeclared bodies must be UTF-8.
    let body = if content_type.is_some() {
        response.text().await?
    } else {
        let bytes = response.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| AppError::fetch(url, "non-text response (invalid UTF-8)"))?
    };

    Ok(FetchedPage {
        url: url.to_string(),
        content_type,
        body,
    })
}
