use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::types::{Article, ArticleFeed};

/// Errors produced while turning a feed payload into an [`ArticleFeed`].
///
/// Decoding is all-or-nothing: one malformed entry fails the whole feed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not JSON, or its top level is not an array.
    #[error("Invalid feed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// An array entry is missing a key or has a value of the wrong type.
    #[error("Invalid article at index {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Wire shape of one feed entry. Unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct RawArticle {
    id: String,
    title: String,
    author: RawAuthor,
    image: String,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: String,
}

impl From<RawArticle> for Article {
    fn from(raw: RawArticle) -> Self {
        Article {
            id: raw.id,
            title: raw.title,
            author_name: raw.author.name,
            image_url: raw.image,
        }
    }
}

/// Decode a feed payload.
///
/// The payload must be a JSON array of
/// `{ "id": string, "title": string, "author": { "name": string }, "image": string }`.
/// The array is parsed first so that a bad entry can be reported by index.
pub fn decode(bytes: &[u8]) -> Result<ArticleFeed, DecodeError> {
    let entries: Vec<Value> = serde_json::from_slice(bytes)?;

    let articles = entries
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<RawArticle>(value)
                .map(Article::from)
                .map_err(|source| DecodeError::Entry { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ArticleFeed::new(articles))
}
