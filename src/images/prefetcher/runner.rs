use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::{PrefetchCommand, WorkerMessage};
use super::{PrefetchEvent, PrefetchJob};
use crate::feed::ParsedItem;
use crate::fetch::{Fetch, ProxyConfig};
use crate::images::cache::SharedImageCache;
use crate::images::finder::item_image_urls;
use crate::util::{catch_task_panic, resolve_image_url};

struct ActiveJob {
    id: u64,
    abort: Arc<AtomicBool>,
}

/// The prefetcher's main loop and the only writer of the image cache.
pub(super) struct PrefetchActor<F> {
    fetcher: Arc<F>,
    cache: SharedImageCache,
    proxy: ProxyConfig,

    commands: mpsc::Receiver<PrefetchCommand>,
    events: mpsc::Sender<PrefetchEvent>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,

    active: Option<ActiveJob>,
    /// Latest request made while a job was running; later requests overwrite it.
    pending: Option<PrefetchJob>,
    next_job_id: u64,
}

impl<F: Fetch> PrefetchActor<F> {
    pub(super) fn new(
        fetcher: Arc<F>,
        cache: SharedImageCache,
        proxy: ProxyConfig,
        commands: mpsc::Receiver<PrefetchCommand>,
        events: mpsc::Sender<PrefetchEvent>,
    ) -> Self {
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            cache,
            proxy,
            commands,
            events,
            worker_tx,
            worker_rx,
            active: None,
            pending: None,
            next_job_id: 0,
        }
    }

    pub(super) async fn run(mut self) {
        tracing::debug!("Image prefetcher started");
        let mut commands_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => commands_open = false,
                },
                Some(message) = self.worker_rx.recv() => {
                    self.handle_worker(message).await;
                }
            }

            if !commands_open && self.active.is_none() {
                break;
            }
        }

        tracing::debug!("Image prefetcher stopped");
    }

    async fn handle_command(&mut self, command: PrefetchCommand) {
        match command {
            PrefetchCommand::Prefetch { items, context } => {
                let job = PrefetchJob { items, context };
                match &self.active {
                    Some(active) => {
                        tracing::debug!(job = active.id, "Aborting prefetch for newer request");
                        active.abort.store(true, Ordering::Release);
                        self.pending = Some(job);
                    }
                    None => self.start(job).await,
                }
            }
            PrefetchCommand::SetProxy { proxy } => {
                self.proxy = proxy;
            }
            PrefetchCommand::IsBusy { reply } => {
                let _ = reply.send(self.active.is_some() || self.pending.is_some());
            }
        }
    }

    async fn start(&mut self, job: PrefetchJob) {
        let id = self.next_job_id;
        self.next_job_id = self.next_job_id.wrapping_add(1);
        let abort = Arc::new(AtomicBool::new(false));

        self.active = Some(ActiveJob {
            id,
            abort: abort.clone(),
        });
        tracing::debug!(job = id, items = job.items.len(), "Prefetch started");
        self.emit(PrefetchEvent::Started).await;

        let worker = PrefetchWorker {
            id,
            abort,
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone(),
            proxy: self.proxy.clone(),
            tx: self.worker_tx.clone(),
        };
        tokio::spawn(worker.run(job));
    }

    async fn handle_worker(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Fetched { job, url, image } => {
                // Kept even when the job is aborting: the worker checks the flag
                // after each fetch and never sends an image fetched after it
                if !self.active.as_ref().is_some_and(|a| a.id == job) {
                    tracing::trace!(job, url = %url, "Discarding image from stale prefetch");
                    return;
                }
                self.cache.put(url.clone(), image);
                self.emit(PrefetchEvent::ImageReady { url }).await;
            }
            WorkerMessage::Done { job, panic } => {
                if !self.active.as_ref().is_some_and(|a| a.id == job) {
                    return;
                }
                self.active = None;

                if let Some(error) = panic {
                    tracing::error!(job, error = %error, "Prefetch worker panicked");
                    self.emit(PrefetchEvent::TaskPanicked { error }).await;
                }

                match self.pending.take() {
                    Some(next) => self.start(next).await,
                    None => {
                        tracing::debug!(job, cached = self.cache.len(), "Prefetch finished");
                        self.emit(PrefetchEvent::Finished).await;
                    }
                }
            }
        }
    }

    async fn emit(&self, event: PrefetchEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Prefetch event dropped (receiver closed)");
        }
    }
}

/// Fetches one job's images off the actor.
struct PrefetchWorker<F> {
    id: u64,
    abort: Arc<AtomicBool>,
    fetcher: Arc<F>,
    cache: SharedImageCache,
    proxy: ProxyConfig,
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl<F: Fetch> PrefetchWorker<F> {
    async fn run(self, job: PrefetchJob) {
        let id = self.id;
        let tx = self.tx.clone();
        let panic = catch_task_panic(self.fetch_all(job)).await.err();
        let _ = tx.send(WorkerMessage::Done { job: id, panic });
    }

    async fn fetch_all(&self, job: PrefetchJob) {
        let PrefetchJob { items, context } = job;

        for url in discover(&items) {
            // Cancellation point: checked before every fetch
            if self.aborted() {
                tracing::debug!(job = self.id, "Prefetch aborted");
                return;
            }
            if self.cache.contains(&url) {
                continue;
            }

            let resolved = match resolve_image_url(&url, &context.base_link) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Skipping unresolvable image");
                    continue;
                }
            };

            let image = self.fetcher.fetch_image(resolved.as_str(), &self.proxy).await;
            if self.aborted() {
                tracing::debug!(job = self.id, url = %url, "Prefetch aborted mid-fetch");
                return;
            }
            if image.is_empty() {
                continue;
            }

            if self
                .tx
                .send(WorkerMessage::Fetched {
                    job: self.id,
                    url,
                    image,
                })
                .is_err()
            {
                return;
            }
        }
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

/// Image references across `items`, first occurrence wins.
fn discover(items: &[ParsedItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .flat_map(item_image_urls)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_discover_dedups_across_items() {
        let mut a = ParsedItem::new("a", Utc::now());
        a.content = r#"<img src="x.png"><img src="y.png">"#.to_string();
        let mut b = ParsedItem::new("b", Utc::now());
        b.content = r#"<img src="y.png"><img src="z.png">"#.to_string();

        assert_eq!(
            discover(&[a, b]),
            vec!["x.png".to_string(), "y.png".to_string(), "z.png".to_string()]
        );
    }
}
