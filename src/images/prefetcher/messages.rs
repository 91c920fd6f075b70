use tokio::sync::oneshot;

use super::PrefetchContext;
use crate::feed::ParsedItem;
use crate::fetch::{Image, ProxyConfig};

/// Commands sent from [`PrefetchHandle`](super::PrefetchHandle) to the actor.
pub(super) enum PrefetchCommand {
    Prefetch {
        items: Vec<ParsedItem>,
        context: PrefetchContext,
    },
    SetProxy {
        proxy: ProxyConfig,
    },
    IsBusy {
        reply: oneshot::Sender<bool>,
    },
}

/// Messages from a prefetch worker back to the actor.
pub(super) enum WorkerMessage {
    /// One image landed. `url` is the reference as written in the item.
    Fetched { job: u64, url: String, image: Image },
    /// The worker exited, normally, on abort, or by panicking.
    Done { job: u64, panic: Option<String> },
}
