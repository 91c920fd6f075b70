use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::{Completion, SyncCommand, WorkerOutput};
use super::{FeedSyncRequest, FeedSyncResult, SyncEvent, SyncState};
use crate::feed::filter::select_new_items;
use crate::feed::{FeedParser, ParsedItem};
use crate::fetch::{Fetch, ProxyConfig};
use crate::storage::FeedStore;
use crate::util::catch_task_panic;

/// The coordinator's main loop.
///
/// Owns the queue and the state machine. Store calls run here and are
/// awaited in order; the fetch and parse for the feed in flight run on one
/// spawned worker that reports back over `completions`.
pub(super) struct SyncActor<S, P, F> {
    store: Arc<S>,
    parser: Arc<P>,
    fetcher: Arc<F>,
    proxy: ProxyConfig,

    commands: mpsc::Receiver<SyncCommand>,
    events: mpsc::Sender<SyncEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,

    state: SyncState,
    queue: VecDeque<i64>,
    /// Feeds started since the last enqueue, for "feed X of N" reporting.
    position: usize,
    total: usize,
}

impl<S, P, F> SyncActor<S, P, F>
where
    S: FeedStore,
    P: FeedParser,
    F: Fetch,
{
    pub(super) fn new(
        store: Arc<S>,
        parser: Arc<P>,
        fetcher: Arc<F>,
        proxy: ProxyConfig,
        commands: mpsc::Receiver<SyncCommand>,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        Self {
            store,
            parser,
            fetcher,
            proxy,
            commands,
            events,
            completions_tx,
            completions,
            state: SyncState::Idle,
            queue: VecDeque::new(),
            position: 0,
            total: 0,
        }
    }

    pub(super) async fn run(mut self) {
        tracing::debug!("Feed sync coordinator started");
        let mut commands_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => commands_open = false,
                },
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion).await;
                }
            }

            // With no handles left, finish the current queue and stop
            if !commands_open && !matches!(self.state, SyncState::Fetching(_)) {
                break;
            }
        }

        tracing::debug!("Feed sync coordinator stopped");
    }

    async fn handle_command(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::Enqueue { feed_ids } => {
                tracing::info!(total = feed_ids.len(), "Feed sync requested");
                self.queue = feed_ids.into();
                self.position = 0;
                self.total = self.queue.len();

                if !matches!(self.state, SyncState::Fetching(_)) {
                    self.start_next().await;
                }
            }
            SyncCommand::SetProxy { proxy } => {
                tracing::debug!(proxied = proxy.is_enabled(), "Sync proxy updated");
                self.proxy = proxy;
            }
            SyncCommand::State { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    /// Dequeue feeds until one is in flight or the queue is empty.
    async fn start_next(&mut self) {
        while let Some(feed_id) = self.queue.pop_front() {
            self.position += 1;
            self.emit(SyncEvent::Started {
                feed_id,
                position: self.position,
                total: self.total,
            })
            .await;

            let request = FeedSyncRequest {
                feed_id,
                proxy: self.proxy.clone(),
            };
            if self.dispatch(request).await {
                self.state = SyncState::Fetching(feed_id);
                return;
            }

            // Nothing to fetch for this feed; report it empty and move on
            self.emit(SyncEvent::Progress(FeedSyncResult {
                feed_id,
                new_items: Vec::new(),
            }))
            .await;
        }

        self.state = SyncState::Draining;
        tracing::info!("Feed sync queue drained");
        self.emit(SyncEvent::Complete).await;
    }

    /// Load the feed's sync inputs and hand the network work to a worker.
    ///
    /// Returns false when the store could not provide them.
    async fn dispatch(&mut self, request: FeedSyncRequest) -> bool {
        let feed_id = request.feed_id;

        let metadata = match self.store.feed_metadata(feed_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "Skipping feed: metadata unavailable");
                return false;
            }
        };
        let existing = match self.store.existing_guids(feed_id).await {
            Ok(guids) => guids,
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "Skipping feed: existing items unavailable");
                return false;
            }
        };

        let fetcher = self.fetcher.clone();
        let parser = self.parser.clone();
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let outcome = catch_task_panic(async {
                let bytes = fetcher.fetch(&metadata.url, &request.proxy).await;
                let fetched = !bytes.is_empty();
                let items = if fetched {
                    parser.parse(&bytes)
                } else {
                    Vec::new()
                };
                let parsed = items.len();
                let new_items = select_new_items(
                    items,
                    &existing,
                    metadata.last_updated,
                    metadata.last_purged,
                );
                WorkerOutput {
                    fetched,
                    parsed,
                    new_items,
                }
            })
            .await;

            if completions.send(Completion { feed_id, outcome }).is_err() {
                tracing::debug!(feed_id, "Sync result dropped: coordinator gone");
            }
        });

        true
    }

    async fn handle_completion(&mut self, completion: Completion) {
        let Completion { feed_id, outcome } = completion;

        let new_items = match outcome {
            Ok(output) => self.apply(feed_id, output).await,
            Err(panic_msg) => {
                tracing::error!(feed_id, error = %panic_msg, "Sync worker panicked");
                self.emit(SyncEvent::TaskPanicked {
                    feed_id,
                    error: panic_msg,
                })
                .await;
                Vec::new()
            }
        };

        self.emit(SyncEvent::Progress(FeedSyncResult { feed_id, new_items }))
            .await;

        self.state = SyncState::Idle;
        self.start_next().await;
    }

    /// Persist a worker's items and advance the feed's `last_updated`.
    ///
    /// Returns the items to report as new.
    async fn apply(&mut self, feed_id: i64, output: WorkerOutput) -> Vec<ParsedItem> {
        let WorkerOutput {
            fetched,
            parsed,
            new_items,
        } = output;

        if !fetched {
            // Leave last_updated alone so items published meanwhile are not filtered out
            tracing::warn!(feed_id, "Feed fetch returned no data");
            return Vec::new();
        }
        if parsed == 0 {
            tracing::warn!(feed_id, "Feed document yielded no items");
        }

        if !new_items.is_empty() {
            if let Err(e) = self.store.store_items(feed_id, &new_items).await {
                tracing::error!(feed_id, error = %e, "Failed to store new items");
                return Vec::new();
            }
        }

        if let Err(e) = self.store.set_last_updated(feed_id, Utc::now()).await {
            tracing::warn!(feed_id, error = %e, "Failed to record feed update time");
        }

        tracing::info!(feed_id, parsed, new_items = new_items.len(), "Feed synced");
        new_items
    }

    async fn emit(&self, event: SyncEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Sync event dropped (receiver closed)");
        }
    }
}
