//! Background image prefetching with cooperative cancel-and-restart.
//!
//! At most one prefetch job fetches at a time. A new request made while a
//! job is running sets that job's abort flag and waits in a single pending
//! slot; the running job stops at its next image boundary (an in-flight
//! request is never interrupted) and the pending request starts in its
//! place. Images fetched by the aborted job before it stopped stay cached.
//!
//! The actor is the only writer of the [`SharedImageCache`]; workers only
//! read it to skip images that are already there.

mod handle;
mod messages;
mod runner;

use std::sync::Arc;
use tokio::sync::mpsc;

pub use handle::{PrefetchHandle, PrefetcherStopped};

use super::cache::SharedImageCache;
use crate::feed::ParsedItem;
use crate::fetch::{Fetch, ProxyConfig};
use runner::PrefetchActor;

const CHANNEL_CAPACITY: usize = 64;

/// Where relative image references of a batch of items are resolved from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchContext {
    /// Usually the feed's home page.
    pub base_link: String,
}

impl PrefetchContext {
    pub fn new(base_link: impl Into<String>) -> Self {
        Self {
            base_link: base_link.into(),
        }
    }
}

/// Notifications emitted by a running prefetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchEvent {
    /// A job began fetching.
    Started,
    /// An image was stored under `url`, the reference as written in the item.
    ImageReady { url: String },
    /// Nothing is running and nothing is waiting.
    Finished,
    TaskPanicked { error: String },
}

/// Unit of work: the items whose images to fetch. Replaced, never edited,
/// when a newer request supersedes it.
pub(crate) struct PrefetchJob {
    pub items: Vec<ParsedItem>,
    pub context: PrefetchContext,
}

/// Builder for an image prefetch actor.
pub struct ImagePrefetcher<F> {
    fetcher: Arc<F>,
    cache: SharedImageCache,
    proxy: ProxyConfig,
}

impl<F: Fetch> ImagePrefetcher<F> {
    pub fn new(fetcher: Arc<F>, cache: SharedImageCache) -> Self {
        Self {
            fetcher,
            cache,
            proxy: ProxyConfig::none(),
        }
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Start the actor on the current Tokio runtime.
    pub fn spawn(self) -> (PrefetchHandle, mpsc::Receiver<PrefetchEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let actor = PrefetchActor::new(self.fetcher, self.cache, self.proxy, command_rx, event_tx);
        tokio::spawn(actor.run());

        (PrefetchHandle::new(command_tx), event_rx)
    }
}
