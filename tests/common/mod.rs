//! Shared fixtures for integration tests: an in-memory [`FeedStore`] and an
//! instrumented [`Fetch`] implementation that can hold requests at a gate.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};

use feedsync::feed::ParsedItem;
use feedsync::fetch::{Fetch, ProxyConfig};
use feedsync::storage::{FeedMetadata, FeedStore, StoreError};

/// Smallest payload recognized as a PNG image.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    feeds: Mutex<HashMap<i64, FeedMetadata>>,
    items: Mutex<HashMap<i64, Vec<ParsedItem>>>,
    fail_store: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feed(&self, feed_id: i64, url: &str) {
        self.insert_feed(
            feed_id,
            FeedMetadata {
                url: url.to_string(),
                web_page_link: None,
                last_updated: None,
                last_purged: None,
            },
        );
    }

    pub fn insert_feed(&self, feed_id: i64, metadata: FeedMetadata) {
        self.feeds.lock().unwrap().insert(feed_id, metadata);
    }

    pub fn last_updated(&self, feed_id: i64) -> Option<DateTime<Utc>> {
        self.feeds
            .lock()
            .unwrap()
            .get(&feed_id)
            .and_then(|m| m.last_updated)
    }

    pub fn stored_guids(&self, feed_id: i64) -> Vec<String> {
        self.items
            .lock()
            .unwrap()
            .get(&feed_id)
            .map(|items| items.iter().map(|i| i.guid.clone()).collect())
            .unwrap_or_default()
    }

    /// Make every later `store_items` call fail.
    pub fn fail_writes(&self) {
        self.fail_store.store(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn feed_metadata(&self, feed_id: i64) -> Result<FeedMetadata, StoreError> {
        self.feeds
            .lock()
            .unwrap()
            .get(&feed_id)
            .cloned()
            .ok_or(StoreError::NotFound(feed_id))
    }

    async fn existing_guids(&self, feed_id: i64) -> Result<HashSet<String>, StoreError> {
        Ok(self.stored_guids(feed_id).into_iter().collect())
    }

    async fn set_last_updated(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        match self.feeds.lock().unwrap().get_mut(&feed_id) {
            Some(meta) => {
                meta.last_updated = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound(feed_id)),
        }
    }

    async fn store_items(&self, feed_id: i64, items: &[ParsedItem]) -> Result<usize, StoreError> {
        if self.fail_store.load(Ordering::SeqCst) != 0 {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.items
            .lock()
            .unwrap()
            .entry(feed_id)
            .or_default()
            .extend(items.iter().cloned());
        Ok(items.len())
    }
}

// ============================================================================
// TestFetcher
// ============================================================================

/// Canned responses with request accounting.
///
/// Unknown URLs answer with an empty body, like a failed request. When gated,
/// every request waits for a permit from [`TestFetcher::release`].
pub struct TestFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    panics: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    entered: Mutex<Option<mpsc::UnboundedSender<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TestFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            panics: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            entered: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every request until released.
    ///
    /// The returned receiver yields each URL as its request begins waiting.
    pub fn gated() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut fetcher = Self::new();
        fetcher.gate = Some(Arc::new(Semaphore::new(0)));
        fetcher.entered = Mutex::new(Some(tx));
        (fetcher, rx)
    }

    pub fn respond(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
        self
    }

    pub fn panic_on(self, url: &str) -> Self {
        self.panics.lock().unwrap().insert(url.to_string());
        self
    }

    /// Let `n` waiting (or future) requests through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for TestFetcher {
    async fn fetch(&self, url: &str, _proxy: &ProxyConfig) -> Vec<u8> {
        self.requests.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(tx) = self.entered.lock().unwrap().as_ref() {
            let _ = tx.send(url.to_string());
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.panics.lock().unwrap().contains(url) {
            panic!("fetch exploded for {url}");
        }
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// Documents
// ============================================================================

/// RSS 2.0 document with one `<item>` per `(guid, published)` pair.
pub fn rss(items: &[(&str, DateTime<Utc>)]) -> String {
    let mut body = String::new();
    for (guid, published) in items {
        body.push_str(&format!(
            "<item><title>{guid}</title><link>https://example.com/{guid}</link>\
             <guid>{guid}</guid><pubDate>{}</pubDate></item>",
            published.to_rfc2822()
        ));
    }
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title><link>https://example.com/</link><description>d</description>{body}</channel></rss>"#
    )
}

/// Item whose body references `images` in order.
pub fn item_with_images(guid: &str, images: &[&str]) -> ParsedItem {
    let mut item = ParsedItem::new(guid, Utc::now());
    item.content = images
        .iter()
        .map(|src| format!(r#"<p><img src="{src}"></p>"#))
        .collect();
    item
}
