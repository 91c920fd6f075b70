use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::fetch::Image;

/// Default number of images kept in memory.
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 200;

/// Bounded in-memory image store with least-recently-used eviction.
///
/// Keys are the image reference exactly as it appears in the item's HTML,
/// before any URL resolution.
pub struct ImageCache {
    entries: LruCache<String, Image>,
}

impl ImageCache {
    /// Create a cache holding at most `capacity` images. A capacity of zero
    /// is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Insert or replace an image, marking it most recently used.
    ///
    /// Inserting a new key into a full cache evicts the least recently used
    /// entry first. Empty images are ignored.
    pub fn put(&mut self, key: impl Into<String>, image: Image) {
        if image.is_empty() {
            return;
        }
        self.entries.put(key.into(), image);
    }

    /// Check presence without touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Look up an image, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<Image> {
        self.entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_CACHE_CAPACITY)
    }
}

/// Handle to an [`ImageCache`] shared between the prefetch actor (the only
/// writer) and readers such as a renderer.
///
/// A panic while the lock is held does not make the cache unusable: the
/// poisoned guard is recovered and the cache keeps serving.
#[derive(Clone)]
pub struct SharedImageCache {
    inner: Arc<Mutex<ImageCache>>,
}

impl SharedImageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ImageCache::new(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ImageCache> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put(&self, key: impl Into<String>, image: Image) {
        self.lock().put(key, image);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn get(&self, key: &str) -> Option<Image> {
        self.lock().get(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }
}

impl Default for SharedImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_CACHE_CAPACITY)
    }
}
