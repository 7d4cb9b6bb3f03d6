use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;

use crate::enrichment::{EnrichmentQueue, SharedExtensions, create_shared_extensions};
use crate::grid::VirtualGrid;
use crate::loader::{LoadStatus, LoaderEvent, PageLoader, PageQuery, PageSource};
use crate::record::{GridRecord, RecordKey};
use crate::render_loop::{FrameScheduler, FrameToken};
use crate::renderer::CellRenderer;
use crate::selection::Selection;

/// Grid and loader wired together: scrolling feeds the loader, loaded pages
/// feed the grid.
pub struct Gallery<R: GridRecord, H: CellRenderer<R>, F: FrameScheduler, S: PageSource<R>> {
    grid: VirtualGrid<R, H, F>,
    loader: PageLoader<R, S>,
    hydration: EnrichmentQueue,
    extensions: SharedExtensions,
    disposed: bool,
}

impl<R: GridRecord, H: CellRenderer<R>, F: FrameScheduler, S: PageSource<R>> Gallery<R, H, F, S> {
    pub fn new(grid: VirtualGrid<R, H, F>, loader: PageLoader<R, S>) -> Self {
        Self {
            grid,
            loader,
            hydration: EnrichmentQueue::default(),
            extensions: create_shared_extensions(),
            disposed: false,
        }
    }

    pub fn with_hydration_capacity(mut self, capacity: usize) -> Self {
        self.hydration = EnrichmentQueue::new(capacity);
        self
    }

    pub fn grid(&self) -> &VirtualGrid<R, H, F> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut VirtualGrid<R, H, F> {
        &mut self.grid
    }

    pub fn loader(&self) -> &PageLoader<R, S> {
        &self.loader
    }

    pub fn status(&self) -> LoadStatus {
        self.loader.status()
    }

    pub fn extensions(&self) -> SharedExtensions {
        self.extensions.clone()
    }

    pub fn hydration_queue(&self) -> &EnrichmentQueue {
        &self.hydration
    }

    /// Keys of newly loaded records waiting for enrichment
    pub fn next_hydration_batch(&mut self, max: usize) -> Vec<RecordKey> {
        self.hydration.take_batch(max)
    }

    pub fn on_resize(&mut self, container_width: f32, scroll_root_width: f32, viewport_height: f32, now: Instant) {
        self.grid.on_resize(container_width, scroll_root_width, viewport_height, now);
    }

    /// User scroll: renders and arms the loader for the next page
    pub fn on_scroll(&mut self, offset: f32) {
        if self.disposed {
            return;
        }
        self.grid.on_scroll(offset);
        self.loader.note_user_scroll();
    }

    /// Frame callback: render, then apply finished pages and check the sentinel
    pub fn frame(&mut self, token: FrameToken, now: Instant) {
        if self.disposed {
            return;
        }
        self.grid.frame(token, now);
        self.pump();
    }

    /// Applies finished pages and starts the next fetch when the sentinel is near
    pub fn pump(&mut self) {
        if self.disposed {
            return;
        }
        for event in self.loader.poll() {
            self.apply(event);
        }
        self.check_sentinel();
    }

    /// Waits for the in-flight page (if any) and applies it
    pub async fn settle(&mut self) {
        if self.disposed || !self.loader.is_loading() {
            return;
        }
        if let Some(event) = self.loader.recv().await {
            self.apply(event);
        }
        self.check_sentinel();
    }

    fn apply(&mut self, event: LoaderEvent<R>) {
        match event {
            LoaderEvent::Appended { items, inserted } => {
                if inserted > 0 {
                    for record in items.iter().skip(items.len() - inserted) {
                        self.hydration.push(record.key());
                    }
                }
                self.grid.set_items(items, false);
            }
            LoaderEvent::Exhausted => {
                log::debug!("[Gallery] all pages loaded ({} items)", self.loader.items().len());
            }
            LoaderEvent::Failed(err) => {
                log::debug!("[Gallery] page failed, waiting for retry: {err}");
            }
        }
    }

    fn check_sentinel(&mut self) {
        let probe = self.grid.sentinel_probe();
        self.loader.maybe_load(probe);
    }

    /// Switches to a new query: drops all records and cells, scrolls to the
    /// top, forgets the measured meta height and starts loading the first page.
    pub fn reset(&mut self, query: PageQuery) {
        if self.disposed {
            return;
        }
        let items = self.loader.reset(query);
        self.hydration.clear();
        self.extensions.lock().clear();
        self.grid.reset_measurement();
        self.grid.set_items(items, true);
        self.check_sentinel();
    }

    pub fn retry(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.loader.retry()
    }

    /// Explicitly removes one record
    pub fn remove(&mut self, key: &RecordKey) -> bool {
        if self.disposed {
            return false;
        }
        let Some(items) = self.loader.remove(key) else {
            return false;
        };
        self.extensions.lock().remove(key);
        self.grid.set_items(items, false);
        true
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.grid.set_selection(selection);
    }

    /// Stores enrichment data for a record and refreshes its card if visible
    pub fn enrich(&mut self, key: RecordKey, fields: HashMap<String, Value>) {
        if self.disposed {
            return;
        }
        let changed = self.extensions.lock().merge(key.clone(), fields);
        if changed {
            self.grid.record_changed(&key);
        }
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.loader.dispose();
        self.grid.dispose();
        self.hydration.clear();
    }
}
