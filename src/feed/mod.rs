//! Feed retrieval: HTTP fetching and JSON decoding.
//!
//! - [`fetcher`] - the [`Fetcher`] seam and its reqwest implementation
//! - [`decoder`] - typed projection of the JSON payload into an [`ArticleFeed`]
//! - [`types`] - [`Article`] and the immutable [`ArticleFeed`] snapshot
//!
//! # Example
//!
//! ```ignore
//! use mbgfeed::feed::{fetch_feed, HttpFetcher};
//!
//! let fetcher = HttpFetcher::for_feed(client, &config);
//! let feed = fetch_feed(&fetcher, &config.feed_url, &cancel).await?;
//! ```

mod decoder;
mod fetcher;
mod types;

pub use decoder::{decode, DecodeError};
pub use fetcher::{build_client, FetchError, Fetcher, HttpFetcher};
pub use types::{Article, ArticleFeed};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure of one feed load attempt. Terminal: feed loads are never retried.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Fetch the feed at `url` and decode it.
pub async fn fetch_feed(
    fetcher: &dyn Fetcher,
    url: &str,
    cancel: &CancellationToken,
) -> Result<ArticleFeed, LoadError> {
    let bytes = fetcher.fetch(url, cancel).await?;
    let feed = decode(&bytes)?;
    tracing::debug!(url = %url, bytes = bytes.len(), articles = feed.len(), "Feed decoded");
    Ok(feed)
}
