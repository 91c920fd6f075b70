use tokio::sync::oneshot;

use super::SyncState;
use crate::feed::ParsedItem;
use crate::fetch::ProxyConfig;

/// Commands sent from [`FeedSyncHandle`](super::FeedSyncHandle) to the actor.
pub(super) enum SyncCommand {
    /// Replace the queue with these feeds.
    Enqueue { feed_ids: Vec<i64> },

    /// Proxy used for requests dequeued from now on.
    SetProxy { proxy: ProxyConfig },

    State { reply: oneshot::Sender<SyncState> },
}

/// What a sync worker produced for one feed.
pub(super) struct WorkerOutput {
    /// False when the fetch came back empty.
    pub fetched: bool,
    /// Items the parser returned before filtering.
    pub parsed: usize,
    pub new_items: Vec<ParsedItem>,
}

/// Sent by a sync worker back to the actor when it finishes.
pub(super) struct Completion {
    pub feed_id: i64,
    pub outcome: Result<WorkerOutput, String>,
}
