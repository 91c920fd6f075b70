//! Sequential feed synchronization.
//!
//! A coordinator owns a FIFO queue of feed ids and syncs them strictly one
//! at a time: load metadata from the store, fetch, parse, drop known and
//! out-of-window items, persist, report, then dequeue the next feed.
//! At most one feed request is in flight no matter how long the queue is,
//! which bounds outbound connections through a shared proxy and keeps
//! progress reporting ordered.
//!
//! The coordinator runs as an actor: [`FeedSyncCoordinator::spawn`] starts
//! it and returns a [`FeedSyncHandle`] for commands plus a receiver of
//! [`SyncEvent`]s.
//!
//! ```ignore
//! let (handle, mut events) = FeedSyncCoordinator::new(db, RssParser, fetcher).spawn();
//! handle.request_feed_sync(vec![1, 2, 3]).await?;
//! while let Some(event) = events.recv().await {
//!     if let SyncEvent::Complete = event { break; }
//! }
//! ```

mod handle;
mod messages;
mod runner;

use std::sync::Arc;
use tokio::sync::mpsc;

pub use handle::{CoordinatorStopped, FeedSyncHandle};

use super::{FeedParser, ParsedItem};
use crate::fetch::{Fetch, ProxyConfig};
use crate::storage::FeedStore;
use runner::SyncActor;

/// Capacity of the command and event channels.
const CHANNEL_CAPACITY: usize = 64;

/// Where the coordinator's state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing requested yet.
    Idle,
    /// This feed's fetch is in flight.
    Fetching(i64),
    /// The last queue has been fully processed.
    Draining,
}

/// Input to one sync cycle, built when a feed is dequeued.
#[derive(Debug, Clone)]
pub struct FeedSyncRequest {
    pub feed_id: i64,
    pub proxy: ProxyConfig,
}

/// Output of one completed sync cycle.
///
/// `new_items` excludes duplicates and anything outside the date window, and
/// has already been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSyncResult {
    pub feed_id: i64,
    pub new_items: Vec<ParsedItem>,
}

/// Notifications emitted by a running coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A feed was dequeued. `position` is 1-based within the latest request.
    Started {
        feed_id: i64,
        position: usize,
        total: usize,
    },
    /// A feed finished, successfully or not. Fired exactly once per dequeued feed.
    Progress(FeedSyncResult),
    /// The queue drained.
    Complete,
    /// The worker for `feed_id` panicked; a `Progress` with no items follows.
    TaskPanicked { feed_id: i64, error: String },
}

/// Builder for a feed sync actor.
pub struct FeedSyncCoordinator<S, P, F> {
    store: Arc<S>,
    parser: Arc<P>,
    fetcher: Arc<F>,
    proxy: ProxyConfig,
}

impl<S, P, F> FeedSyncCoordinator<S, P, F>
where
    S: FeedStore,
    P: FeedParser,
    F: Fetch,
{
    pub fn new(store: Arc<S>, parser: Arc<P>, fetcher: Arc<F>) -> Self {
        Self {
            store,
            parser,
            fetcher,
            proxy: ProxyConfig::none(),
        }
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Start the actor on the current Tokio runtime.
    pub fn spawn(self) -> (FeedSyncHandle, mpsc::Receiver<SyncEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let actor = SyncActor::new(
            self.store,
            self.parser,
            self.fetcher,
            self.proxy,
            command_rx,
            event_tx,
        );
        tokio::spawn(actor.run());

        (FeedSyncHandle::new(command_tx), event_rx)
    }
}
