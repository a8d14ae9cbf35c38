//! Outbound interface to the presentation layer.
//!
//! The view model never renders anything itself. It reports state changes
//! through [`Presenter`], and the host (a UI toolkit, a terminal, a test)
//! decides what to draw. All callbacks run on the task that owns the view
//! model.

/// Title for the generic feed failure dialog.
pub const LOAD_FAILED_TITLE: &str = "Problem fetching articles";

/// User-facing text for any feed failure. Network and payload errors are
/// deliberately indistinguishable here; the detail goes to the log.
pub const LOAD_FAILED_MESSAGE: &str = "Articles do not appear to be available at this time";

pub trait Presenter: Send {
    /// A feed load began; show the loading indicator.
    fn on_loading_started(&mut self);

    /// The feed load failed. Hide the indicator and show `message`.
    fn on_loading_failed(&mut self, message: &str);

    /// A new feed replaced the rows. Hide the indicator and reload.
    fn on_feed_loaded(&mut self, row_count: usize);

    /// The thumbnail for `article_id` is now cached; redraw that row if it
    /// is still visible.
    fn on_row_image_ready(&mut self, article_id: &str);
}

/// Presenter that only writes tracing events. Used by the headless binary.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn on_loading_started(&mut self) {
        tracing::info!("Loading articles");
    }

    fn on_loading_failed(&mut self, message: &str) {
        tracing::error!(title = LOAD_FAILED_TITLE, "{}", message);
    }

    fn on_feed_loaded(&mut self, row_count: usize) {
        tracing::info!(rows = row_count, "Articles loaded");
    }

    fn on_row_image_ready(&mut self, article_id: &str) {
        tracing::debug!(article_id = %article_id, "Row image ready");
    }
}
