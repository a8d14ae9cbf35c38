use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::util::{validate_url, UrlValidationError};

/// Errors that can occur while fetching a feed or an image.
///
/// Any of these means "no payload": callers never see bytes alongside an
/// error.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// URL failed validation before any request was made
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// The cancellation token fired before the request completed
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if this error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::IncompleteResponse { .. } => true,
            // Redirect loops and bad requests fail the same way every time
            FetchError::Network(e) => !e.is_redirect() && !e.is_builder(),
            FetchError::HttpStatus(status) => *status >= 500,
            FetchError::ResponseTooLarge(_) | FetchError::InvalidUrl(_) | FetchError::Cancelled => {
                false
            }
        }
    }
}

const MAX_REDIRECTS: usize = 3;

/// Source of raw bytes for a URL.
///
/// One call issues at most one request. Retrying is the caller's decision.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Bytes, FetchError>;
}

/// Create a redirect policy with loop detection and limited hops.
///
/// - Follows at most [`MAX_REDIRECTS`] hops
/// - Detects redirect loops (same URL appearing twice in chain)
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        // `previous()` starts with the original request URL, so it holds
        // one more entry than the number of redirects already followed.
        let hop = attempt.previous().len();
        if hop > MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Build the shared HTTP client from configuration.
///
/// The client is cheap to clone; feed and image fetchers share one
/// connection pool.
pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(create_redirect_policy())
        .connect_timeout(config.request_timeout())
        .build()
}

/// reqwest-backed [`Fetcher`] with a per-request timeout and body size limit.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    /// Fetcher for the feed payload, limited to `max_feed_bytes`.
    pub fn for_feed(client: reqwest::Client, config: &Config) -> Self {
        Self::new(client, config.request_timeout(), config.max_feed_bytes)
    }

    /// Fetcher for thumbnails, limited to `max_image_bytes`.
    pub fn for_images(client: reqwest::Client, config: &Config) -> Self {
        Self::new(client, config.request_timeout(), config.max_image_bytes)
    }

    async fn fetch_once(&self, url: url::Url) -> Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?;

        // Status is checked before the body is read; a 404 page is never
        // handed to the decoder.
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
        let parsed = validate_url(url)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::trace!(url = %url, "Fetch cancelled");
                Err(FetchError::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, self.fetch_once(parsed)) => {
                result.map_err(|_| FetchError::Timeout)?
            }
        }
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Bytes, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        // hyper surfaces a body cut short of Content-Length as a body error
        let chunk = chunk.map_err(|e| match expected_length {
            Some(expected) if e.is_body() && (bytes.len() as u64) < expected => {
                FetchError::IncompleteResponse {
                    expected,
                    received: bytes.len(),
                }
            }
            _ => FetchError::Network(e),
        })?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(Bytes::from(bytes))
}
