//! Feed synchronization: parsing, filtering, the sync queue and purging.
//!
//! # Architecture
//!
//! - [`item`] - the [`ParsedItem`] model shared with storage and image discovery
//! - [`parser`] - the [`FeedParser`] seam and its `feed-rs` implementation
//! - [`filter`] - deduplication and the last-updated/last-purged date window
//! - [`coordinator`] - the one-feed-at-a-time sync actor
//! - [`purge`] - deleting old items and recording the purge cutoff
//!
//! # Example
//!
//! ```ignore
//! use feedsync::feed::{FeedSyncCoordinator, RssParser, SyncEvent};
//!
//! let (handle, mut events) =
//!     FeedSyncCoordinator::new(Arc::new(db), Arc::new(RssParser), Arc::new(fetcher)).spawn();
//! handle.request_feed_sync(feed_ids).await?;
//! ```

mod coordinator;
mod filter;
mod item;
mod parser;
mod purge;

pub use coordinator::{
    CoordinatorStopped, FeedSyncCoordinator, FeedSyncHandle, FeedSyncRequest, FeedSyncResult,
    SyncEvent, SyncState,
};
pub use filter::select_new_items;
pub use item::{Enclosure, ParsedItem};
pub use parser::{parse_items, FeedParser, RssParser};
pub use purge::{FeedPurged, FeedPurger};
