use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::types::{FeedMetadata, StoreError};
use crate::feed::ParsedItem;

/// Persistence as seen by the sync coordinator.
///
/// Every call is awaited before the coordinator moves on, so implementations
/// never observe two calls for the same sync cycle at once.
#[async_trait]
pub trait FeedStore: Send + Sync + 'static {
    /// URL, home page and sync thresholds for a feed.
    async fn feed_metadata(&self, feed_id: i64) -> Result<FeedMetadata, StoreError>;

    /// GUIDs of every item already stored for the feed.
    async fn existing_guids(&self, feed_id: i64) -> Result<HashSet<String>, StoreError>;

    async fn set_last_updated(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Persist freshly synced items, returning how many rows were inserted.
    async fn store_items(&self, feed_id: i64, items: &[ParsedItem]) -> Result<usize, StoreError>;
}
