//! Article feed client.
//!
//! Fetches a remote JSON article feed, exposes it as an ordered list of rows
//! and loads row thumbnails on demand into an in-memory cache.
//!
//! - [`feed`] - HTTP fetching and typed decoding of the payload
//! - [`cache`] - thumbnail storage, cleared on memory pressure
//! - [`app`] - [`FeedViewModel`], the row model driven by background fetches
//! - [`events`] - applies fetch completions on the owning task
//! - [`presenter`] - outbound callbacks to whatever draws the rows
//! - [`config`] - TOML configuration

pub mod app;
pub mod cache;
pub mod config;
pub mod events;
pub mod feed;
pub mod presenter;
pub mod util;

pub use app::{AppEvent, ArticleSelection, FeedState, FeedViewModel, ImageState, RowData};
pub use events::handle_app_event;
pub use presenter::Presenter;
