use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::{image_store, ImageStore};
use crate::config::Config;
use crate::feed::{self, Article, ArticleFeed, FetchError, Fetcher, HttpFetcher, LoadError};
use crate::presenter::Presenter;

/// Base delay for thumbnail retries; doubles per attempt (1s, 2s, 4s...).
const IMAGE_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// State and Row Types
// ============================================================================

/// Feed-level state. A failed load never leaves `Loaded` or enters it.
#[derive(Debug, Clone, Default)]
pub enum FeedState {
    #[default]
    Empty,
    Loaded(ArticleFeed),
}

impl FeedState {
    pub fn feed(&self) -> Option<&ArticleFeed> {
        match self {
            FeedState::Empty => None,
            FeedState::Loaded(feed) => Some(feed),
        }
    }
}

/// Per-row thumbnail state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageState {
    Pending,
    Ready(Bytes),
}

impl ImageState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ImageState::Pending)
    }
}

/// Everything the presentation layer needs to draw one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData {
    pub article: Article,
    pub image: ImageState,
}

/// Payload handed to a detail screen when a row is selected.
///
/// `image` is `None` when the thumbnail has not arrived (or was dropped on
/// memory pressure); detail screens must cope with that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSelection {
    pub article: Article,
    pub image: Option<Bytes>,
}

// ============================================================================
// Events
// ============================================================================

/// Completions sent from background fetch tasks to the owning task.
///
/// Background tasks never touch view-model state; the owner applies these
/// with [`crate::events::handle_app_event`].
#[derive(Debug)]
pub enum AppEvent {
    /// Feed fetch+decode finished.
    ///
    /// Fields:
    /// - `generation`: The feed generation when this load was spawned
    /// - `result`: The decoded feed or the load error
    FeedLoaded {
        generation: u64,
        result: Result<ArticleFeed, LoadError>,
    },
    /// Thumbnail fetch finished, keyed by image URL rather than row index.
    ImageLoaded {
        url: String,
        result: Result<Bytes, FetchError>,
    },
}

// ============================================================================
// Feed View Model
// ============================================================================

/// Owns the feed snapshot, the thumbnail cache and the in-flight set.
///
/// All methods must be called from the single owning task. Network work is
/// spawned onto the tokio runtime and reported back as [`AppEvent`]s on
/// `event_tx`.
pub struct FeedViewModel {
    pub(crate) state: FeedState,
    pub(crate) feed_url: String,
    pub(crate) feed_fetcher: Arc<dyn Fetcher>,
    pub(crate) image_fetcher: Arc<dyn Fetcher>,
    pub(crate) cache: Box<dyn ImageStore>,
    pub(crate) presenter: Box<dyn Presenter>,
    pub(crate) event_tx: mpsc::Sender<AppEvent>,
    /// Image URLs with a fetch outstanding (per-key dedup)
    pub(crate) in_flight: HashSet<String>,
    /// Bumped on every `load_feed`; completions from older loads are ignored
    pub(crate) feed_generation: u64,
    pub(crate) feed_loading: bool,
    feed_cancel: Option<CancellationToken>,
    root_cancel: CancellationToken,
    image_retries: u32,
}

impl FeedViewModel {
    pub fn new(
        feed_url: impl Into<String>,
        feed_fetcher: Arc<dyn Fetcher>,
        image_fetcher: Arc<dyn Fetcher>,
        cache: Box<dyn ImageStore>,
        presenter: Box<dyn Presenter>,
        event_tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            state: FeedState::Empty,
            feed_url: feed_url.into(),
            feed_fetcher,
            image_fetcher,
            cache,
            presenter,
            event_tx,
            in_flight: HashSet::new(),
            feed_generation: 0,
            feed_loading: false,
            feed_cancel: None,
            root_cancel: CancellationToken::new(),
            image_retries: 0,
        }
    }

    /// Wire a view model from configuration with reqwest fetchers sharing
    /// `client`.
    pub fn from_config(
        config: &Config,
        client: reqwest::Client,
        presenter: Box<dyn Presenter>,
        event_tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        let feed_fetcher = Arc::new(HttpFetcher::for_feed(client.clone(), config));
        let image_fetcher = Arc::new(HttpFetcher::for_images(client, config));
        Self::new(
            config.feed_url.clone(),
            feed_fetcher,
            image_fetcher,
            image_store(config.image_cache_capacity),
            presenter,
            event_tx,
        )
        .with_image_retries(config.image_retries)
    }

    /// Retry transient thumbnail failures up to `retries` times.
    pub fn with_image_retries(mut self, retries: u32) -> Self {
        self.image_retries = retries;
        self
    }

    // ------------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------------

    /// Start (or restart) loading the feed.
    ///
    /// Any earlier load still in flight is cancelled and its completion will
    /// be ignored. The current rows stay visible until the new feed arrives.
    pub fn load_feed(&mut self) {
        if let Some(previous) = self.feed_cancel.take() {
            previous.cancel();
        }

        self.feed_generation += 1;
        self.feed_loading = true;
        let generation = self.feed_generation;
        let cancel = self.root_cancel.child_token();
        self.feed_cancel = Some(cancel.clone());

        self.presenter.on_loading_started();
        tracing::debug!(url = %self.feed_url, generation, "Spawning feed load");

        let fetcher = Arc::clone(&self.feed_fetcher);
        let url = self.feed_url.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = feed::fetch_feed(fetcher.as_ref(), &url, &cancel).await;
            if tx
                .send(AppEvent::FeedLoaded { generation, result })
                .await
                .is_err()
            {
                tracing::trace!(generation, "Event receiver dropped, discarding feed result");
            }
        });
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn feed(&self) -> Option<&ArticleFeed> {
        self.state.feed()
    }

    pub fn is_loading(&self) -> bool {
        self.feed_loading
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, FeedState::Loaded(_))
    }

    // ------------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------------

    pub fn row_count(&self) -> usize {
        self.state.feed().map_or(0, |feed| feed.len())
    }

    /// Data for row `index`, or `None` if out of range.
    ///
    /// A cached thumbnail is returned as `Ready`. Otherwise the row is
    /// `Pending` and a fetch for its image URL is started unless one is
    /// already outstanding.
    pub fn row_data(&mut self, index: usize) -> Option<RowData> {
        let article = self.state.feed()?.get(index)?.clone();

        let image = match self.cache.get(&article.image_url) {
            Some(bytes) => {
                tracing::trace!(url = %article.image_url, "Image cache hit");
                ImageState::Ready(bytes)
            }
            None => {
                self.request_image(&article.image_url);
                ImageState::Pending
            }
        };

        Some(RowData { article, image })
    }

    /// Look up an article in the current feed by its stable id.
    pub fn article(&self, id: &str) -> Option<&Article> {
        self.state.feed()?.find(id)
    }

    /// Hand row `index` to a detail screen. Never starts a fetch.
    pub fn select(&mut self, index: usize) -> Option<ArticleSelection> {
        let article = self.state.feed()?.get(index)?.clone();
        let image = self.cache.get(&article.image_url);
        Some(ArticleSelection { article, image })
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    pub fn in_flight_images(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cached_images(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached thumbnail.
    ///
    /// Outstanding fetches are left running; a completion that lands after
    /// this simply repopulates its own entry.
    pub fn memory_pressure(&mut self) {
        let entries = self.cache.len();
        self.cache.clear();
        tracing::info!(entries, "Memory pressure: image cache cleared");
    }

    fn request_image(&mut self, url: &str) {
        if !self.in_flight.insert(url.to_string()) {
            tracing::debug!(url = %url, "Image fetch already in flight");
            return;
        }

        tracing::debug!(url = %url, "Started image fetch");

        let fetcher = Arc::clone(&self.image_fetcher);
        let tx = self.event_tx.clone();
        let cancel = self.root_cancel.child_token();
        let retries = self.image_retries;
        let url = url.to_string();
        tokio::spawn(async move {
            let result = fetch_image_with_retry(fetcher.as_ref(), &url, retries, &cancel).await;
            if tx.send(AppEvent::ImageLoaded { url, result }).await.is_err() {
                tracing::trace!("Event receiver dropped, discarding image result");
            }
        });
    }

    /// Cancel every outstanding feed and image fetch.
    pub fn shutdown(&mut self) {
        self.root_cancel.cancel();
    }
}

impl Drop for FeedViewModel {
    fn drop(&mut self) {
        self.root_cancel.cancel();
    }
}

/// Fetch a thumbnail, retrying transient failures with exponential backoff.
async fn fetch_image_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    max_retries: u32,
    cancel: &CancellationToken,
) -> Result<Bytes, FetchError> {
    let mut retry_count = 0;

    loop {
        match fetcher.fetch(url, cancel).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.is_retryable() && retry_count < max_retries => {
                let delay = IMAGE_RETRY_BASE_DELAY * (1u32 << retry_count.min(6));
                tracing::debug!(
                    url = %url,
                    error = %e,
                    retry = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying image fetch after transient error"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
