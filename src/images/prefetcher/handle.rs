use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::messages::PrefetchCommand;
use super::PrefetchContext;
use crate::feed::ParsedItem;
use crate::fetch::ProxyConfig;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Image prefetcher has stopped")]
pub struct PrefetcherStopped;

/// Cloneable front end of a running image prefetcher.
#[derive(Clone)]
pub struct PrefetchHandle {
    sender: mpsc::Sender<PrefetchCommand>,
}

impl PrefetchHandle {
    pub(super) fn new(sender: mpsc::Sender<PrefetchCommand>) -> Self {
        Self { sender }
    }

    /// Fetch every image referenced by `items` into the cache.
    ///
    /// Starts immediately when idle. Otherwise the running job is told to
    /// stop at its next image and this request replaces any request already
    /// waiting behind it.
    pub async fn prefetch_images(
        &self,
        items: Vec<ParsedItem>,
        context: PrefetchContext,
    ) -> Result<(), PrefetcherStopped> {
        self.sender
            .send(PrefetchCommand::Prefetch { items, context })
            .await
            .map_err(|_| PrefetcherStopped)
    }

    pub async fn set_proxy(&self, proxy: ProxyConfig) -> Result<(), PrefetcherStopped> {
        self.sender
            .send(PrefetchCommand::SetProxy { proxy })
            .await
            .map_err(|_| PrefetcherStopped)
    }

    /// True while a job is running or waiting.
    pub async fn is_busy(&self) -> Result<bool, PrefetcherStopped> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(PrefetchCommand::IsBusy { reply })
            .await
            .map_err(|_| PrefetcherStopped)?;
        rx.await.map_err(|_| PrefetcherStopped)
    }
}
