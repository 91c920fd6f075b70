use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::messages::SyncCommand;
use super::SyncState;
use crate::fetch::ProxyConfig;

/// The coordinator task is gone (it panicked or the runtime shut down).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Feed sync coordinator has stopped")]
pub struct CoordinatorStopped;

/// Cloneable front end of a running feed sync coordinator.
///
/// Dropping every handle lets the coordinator finish its queue and exit.
#[derive(Clone)]
pub struct FeedSyncHandle {
    sender: mpsc::Sender<SyncCommand>,
}

impl FeedSyncHandle {
    pub(super) fn new(sender: mpsc::Sender<SyncCommand>) -> Self {
        Self { sender }
    }

    /// Queue `feed_ids` for synchronization, in order.
    ///
    /// Replaces whatever is still waiting in the queue. A feed already being
    /// fetched is allowed to finish first.
    pub async fn request_feed_sync(&self, feed_ids: Vec<i64>) -> Result<(), CoordinatorStopped> {
        self.sender
            .send(SyncCommand::Enqueue { feed_ids })
            .await
            .map_err(|_| CoordinatorStopped)
    }

    pub async fn set_proxy(&self, proxy: ProxyConfig) -> Result<(), CoordinatorStopped> {
        self.sender
            .send(SyncCommand::SetProxy { proxy })
            .await
            .map_err(|_| CoordinatorStopped)
    }

    /// Current state of the coordinator's state machine.
    pub async fn state(&self) -> Result<SyncState, CoordinatorStopped> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SyncCommand::State { reply })
            .await
            .map_err(|_| CoordinatorStopped)?;
        rx.await.map_err(|_| CoordinatorStopped)
    }
}
