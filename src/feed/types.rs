use std::ops::Deref;
use std::sync::Arc;

// ============================================================================
// Article
// ============================================================================

/// One article summary from the feed.
///
/// Immutable once decoded. `id` is the stable identity used to match
/// late-arriving image completions to rows; row indices are never used for
/// that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub author_name: String,
    pub image_url: String,
}

// ============================================================================
// ArticleFeed
// ============================================================================

/// Ordered, immutable snapshot of a decoded feed.
///
/// Order is the server-provided order and drives row order. Cloning is O(1)
/// (`Arc<[Article]>`), so the view model can hand the snapshot to consumers
/// without copying article strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArticleFeed {
    articles: Arc<[Article]>,
}

impl ArticleFeed {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles: articles.into(),
        }
    }

    /// Find an article by its stable id.
    pub fn find(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    /// Articles whose thumbnail is `image_url`, in row order.
    pub fn with_image<'a>(&'a self, image_url: &'a str) -> impl Iterator<Item = &'a Article> {
        self.articles.iter().filter(move |a| a.image_url == image_url)
    }
}

impl Deref for ArticleFeed {
    type Target = [Article];

    fn deref(&self) -> &[Article] {
        &self.articles
    }
}

impl From<Vec<Article>> for ArticleFeed {
    fn from(articles: Vec<Article>) -> Self {
        Self::new(articles)
    }
}
