//! In-memory thumbnail cache keyed by image URL.
//!
//! [`ImageCache`] is the default: an unbounded map that is only emptied by
//! [`ImageStore::clear`] on memory pressure. Unbounded growth is a known
//! weakness, kept because the feed is small and memory pressure is the only
//! eviction signal the host gives us.
//!
//! [`BoundedImageCache`] is an opt-in extension layer (`image_cache_capacity`
//! in the config) that adds least-recently-used eviction. `clear` remains
//! the only external eviction trigger for both.

use bytes::Bytes;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Storage for fetched thumbnails.
///
/// `get` takes `&mut self` so that LRU implementations can record the hit.
pub trait ImageStore: Send {
    fn get(&mut self, key: &str) -> Option<Bytes>;
    /// Insert or overwrite.
    fn put(&mut self, key: String, image: Bytes);
    /// Drop every entry.
    fn clear(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the store selected by configuration: `0` means unbounded.
pub fn image_store(capacity: usize) -> Box<dyn ImageStore> {
    match NonZeroUsize::new(capacity) {
        Some(capacity) => Box::new(BoundedImageCache::new(capacity)),
        None => Box::new(ImageCache::default()),
    }
}

// ============================================================================
// Unbounded cache
// ============================================================================

#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<String, Bytes>,
}

impl ImageStore for ImageCache {
    fn get(&mut self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, image: Bytes) {
        self.entries.insert(key, image);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.entries.shrink_to_fit();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// LRU-bounded extension
// ============================================================================

pub struct BoundedImageCache {
    entries: LruCache<String, Bytes>,
}

impl BoundedImageCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }
}

impl ImageStore for BoundedImageCache {
    fn get(&mut self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, image: Bytes) {
        self.entries.put(key, image);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
