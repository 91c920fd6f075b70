use super::controller::PrefetchController;
use super::prefetcher::{PrefetchContext, PrefetchHandle, PrefetcherStopped};
use crate::feed::ParsedItem;

/// Drives an [`ImagePrefetcher`](super::ImagePrefetcher) from list navigation.
///
/// One session per displayed list: it owns the rows, maps the controller's
/// windows to items and asks the prefetcher for their images.
pub struct PrefetchSession {
    controller: PrefetchController,
    items: Vec<ParsedItem>,
    context: PrefetchContext,
    handle: PrefetchHandle,
}

impl PrefetchSession {
    pub fn new(handle: PrefetchHandle, controller: PrefetchController) -> Self {
        Self {
            controller,
            items: Vec::new(),
            context: PrefetchContext::default(),
            handle,
        }
    }

    /// Replace the displayed list and request its first window.
    pub async fn show_items(
        &mut self,
        items: Vec<ParsedItem>,
        context: PrefetchContext,
    ) -> Result<(), PrefetcherStopped> {
        self.controller.set_num_rows(items.len());
        self.items = items;
        self.context = context;
        self.dispatch().await
    }

    /// The selection moved to `row`; request the next window if it is due.
    pub async fn row_selected(&mut self, row: usize) -> Result<(), PrefetcherStopped> {
        self.controller.row_selected(row);
        self.dispatch().await
    }

    pub fn items(&self) -> &[ParsedItem] {
        &self.items
    }

    pub fn controller(&self) -> &PrefetchController {
        &self.controller
    }

    async fn dispatch(&mut self) -> Result<(), PrefetcherStopped> {
        if !self.controller.prefetch_needed() {
            return Ok(());
        }

        let batch: Vec<ParsedItem> = self
            .controller
            .prefetch_list()
            .filter_map(|row| self.items.get(row).cloned())
            .collect();
        if batch.is_empty() {
            return Ok(());
        }

        tracing::debug!(rows = batch.len(), "Requesting image prefetch window");
        self.handle
            .prefetch_images(batch, self.context.clone())
            .await
    }
}
