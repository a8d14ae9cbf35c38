//! Applies background completions to the view model.
//!
//! Every state change caused by network work funnels through
//! [`handle_app_event`], which must run on the task that owns the
//! [`FeedViewModel`]. This is the marshalling point between fetch tasks and
//! the presentation layer.

use bytes::Bytes;

use crate::app::{AppEvent, FeedState, FeedViewModel};
use crate::feed::{ArticleFeed, FetchError, LoadError};
use crate::presenter::LOAD_FAILED_MESSAGE;

pub fn handle_app_event(vm: &mut FeedViewModel, event: AppEvent) {
    match event {
        AppEvent::FeedLoaded { generation, result } => {
            handle_feed_loaded(vm, generation, result);
        }
        AppEvent::ImageLoaded { url, result } => {
            handle_image_loaded(vm, url, result);
        }
    }
}

fn handle_feed_loaded(
    vm: &mut FeedViewModel,
    generation: u64,
    result: Result<ArticleFeed, LoadError>,
) {
    // A newer load_feed superseded this one; its own completion will report.
    if generation != vm.feed_generation {
        tracing::debug!(
            expected = vm.feed_generation,
            got = generation,
            "Ignoring stale feed load (generation mismatch)"
        );
        return;
    }

    vm.feed_loading = false;

    match result {
        Ok(feed) => {
            let rows = feed.len();
            vm.state = FeedState::Loaded(feed);
            tracing::info!(url = %vm.feed_url, rows, "Feed loaded");
            vm.presenter.on_feed_loaded(rows);
        }
        Err(e) => {
            tracing::warn!(url = %vm.feed_url, error = %e, "Feed load failed");
            vm.presenter.on_loading_failed(LOAD_FAILED_MESSAGE);
        }
    }
}

fn handle_image_loaded(vm: &mut FeedViewModel, url: String, result: Result<Bytes, FetchError>) {
    vm.in_flight.remove(&url);

    match result {
        Ok(bytes) => {
            tracing::debug!(url = %url, bytes = bytes.len(), "Finished image fetch");
            vm.cache.put(url.clone(), bytes);

            // Rows are matched by article identity in the *current* feed; the
            // feed may have been replaced since the fetch was spawned.
            if let FeedState::Loaded(feed) = &vm.state {
                for article in feed.with_image(&url) {
                    vm.presenter.on_row_image_ready(&article.id);
                }
            }
        }
        Err(FetchError::Cancelled) => {
            tracing::trace!(url = %url, "Image fetch cancelled");
        }
        Err(e) => {
            // Row stays pending; the next row_data call for it will retry.
            tracing::debug!(url = %url, error = %e, "Image fetch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ImageCache;
    use crate::feed::{Article, Fetcher};
    use crate::presenter::Presenter;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    /// Never resolves; events in these tests are injected by hand.
    struct PendingFetcher;

    #[async_trait]
    impl Fetcher for PendingFetcher {
        async fn fetch(&self, _url: &str, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
            cancel.cancelled().await;
            Err(FetchError::Cancelled)
        }
    }

    #[derive(Clone, Default)]
    struct Calls(Arc<Mutex<Vec<String>>>);

    impl Calls {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Presenter for Calls {
        fn on_loading_started(&mut self) {
            self.0.lock().unwrap().push("started".into());
        }
        fn on_loading_failed(&mut self, message: &str) {
            self.0.lock().unwrap().push(format!("failed:{message}"));
        }
        fn on_feed_loaded(&mut self, row_count: usize) {
            self.0.lock().unwrap().push(format!("loaded:{row_count}"));
        }
        fn on_row_image_ready(&mut self, article_id: &str) {
            self.0.lock().unwrap().push(format!("image:{article_id}"));
        }
    }

    fn view_model() -> (FeedViewModel, Calls, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let calls = Calls::default();
        let vm = FeedViewModel::new(
            "http://x/feed.json",
            Arc::new(PendingFetcher),
            Arc::new(PendingFetcher),
            Box::new(ImageCache::default()),
            Box::new(calls.clone()),
            tx,
        );
        (vm, calls, rx)
    }

    fn feed(entries: &[(&str, &str)]) -> ArticleFeed {
        entries
            .iter()
            .map(|(id, image)| Article {
                id: id.to_string(),
                title: format!("Title {id}"),
                author_name: "Author".to_string(),
                image_url: image.to_string(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn test_stale_feed_generation_ignored() {
        let (mut vm, calls, _rx) = view_model();
        vm.load_feed();
        vm.load_feed();
        assert_eq!(vm.feed_generation, 2);
        calls.take();

        handle_app_event(
            &mut vm,
            AppEvent::FeedLoaded {
                generation: 1,
                result: Ok(feed(&[("1", "http://x/1.png")])),
            },
        );
        assert_eq!(vm.row_count(), 0);
        assert!(vm.is_loading());
        assert!(calls.take().is_empty());

        handle_app_event(
            &mut vm,
            AppEvent::FeedLoaded {
                generation: 2,
                result: Ok(feed(&[("1", "http://x/1.png"), ("2", "http://x/2.png")])),
            },
        );
        assert_eq!(vm.row_count(), 2);
        assert!(!vm.is_loading());
        assert_eq!(calls.take(), vec!["loaded:2"]);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_rows() {
        let (mut vm, calls, _rx) = view_model();
        vm.load_feed();
        handle_app_event(
            &mut vm,
            AppEvent::FeedLoaded {
                generation: 1,
                result: Ok(feed(&[("1", "http://x/1.png")])),
            },
        );
        vm.load_feed();
        handle_app_event(
            &mut vm,
            AppEvent::FeedLoaded {
                generation: 2,
                result: Err(LoadError::Fetch(FetchError::Timeout)),
            },
        );

        assert_eq!(vm.row_count(), 1);
        assert_eq!(
            calls.take(),
            vec![
                "started".to_string(),
                "loaded:1".to_string(),
                "started".to_string(),
                format!("failed:{LOAD_FAILED_MESSAGE}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_image_ready_notifies_every_row_sharing_url() {
        let (mut vm, calls, _rx) = view_model();
        vm.state = FeedState::Loaded(feed(&[
            ("a", "http://x/shared.png"),
            ("b", "http://x/2.png"),
            ("c", "http://x/shared.png"),
        ]));

        assert!(vm.row_data(0).unwrap().image.is_pending());
        assert!(vm.row_data(2).unwrap().image.is_pending());
        assert_eq!(vm.in_flight_images(), 1);

        handle_app_event(
            &mut vm,
            AppEvent::ImageLoaded {
                url: "http://x/shared.png".into(),
                result: Ok(Bytes::from_static(b"img")),
            },
        );

        assert_eq!(vm.in_flight_images(), 0);
        assert_eq!(calls.take(), vec!["image:a", "image:c"]);
        assert!(!vm.row_data(2).unwrap().image.is_pending());
    }

    #[tokio::test]
    async fn test_image_for_replaced_feed_caches_without_notifying() {
        let (mut vm, calls, _rx) = view_model();
        vm.state = FeedState::Loaded(feed(&[("a", "http://x/1.png")]));
        vm.row_data(0);
        vm.state = FeedState::Loaded(feed(&[("z", "http://x/9.png")]));

        handle_app_event(
            &mut vm,
            AppEvent::ImageLoaded {
                url: "http://x/1.png".into(),
                result: Ok(Bytes::from_static(b"img")),
            },
        );

        assert!(calls.take().is_empty());
        assert_eq!(vm.cached_images(), 1);
    }

    #[tokio::test]
    async fn test_image_failure_is_swallowed() {
        let (mut vm, calls, _rx) = view_model();
        vm.state = FeedState::Loaded(feed(&[("a", "http://x/1.png")]));
        vm.row_data(0);

        handle_app_event(
            &mut vm,
            AppEvent::ImageLoaded {
                url: "http://x/1.png".into(),
                result: Err(FetchError::HttpStatus(404)),
            },
        );

        assert!(calls.take().is_empty());
        assert_eq!(vm.in_flight_images(), 0);
        assert_eq!(vm.cached_images(), 0);
        assert!(vm.row_data(0).unwrap().image.is_pending());
    }
}
