use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::RenderItemError;
use crate::layout::{LayoutInput, LayoutMetrics, MetaHeightSampler, compute_layout};
use crate::pool::{Cell, CellPool};
use crate::record::{GridRecord, Items, RecordKey};
use crate::render_loop::{FrameScheduler, FrameToken, RenderLoop};
use crate::renderer::CellRenderer;
use crate::selection::{Selection, SelectionStore};
use crate::window::{RenderWindow, ScrollState, cell_placement, compute_window, row_of};

/// Construction-time configuration of a [`VirtualGrid`]
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub min_item_width: f32,
    pub gap: f32,
    /// Extra rows materialized above and below the viewport
    pub buffer_rows: usize,
    /// Maximum number of detached cells kept for reuse
    pub max_pool_size: usize,
    pub padding: f32,
    /// Cards show a details strip below the media
    pub details_strip: bool,
    pub resize_debounce: Duration,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_item_width: 120.0,
            gap: 10.0,
            buffer_rows: 2,
            max_pool_size: 100,
            padding: 0.0,
            details_strip: false,
            resize_debounce: Duration::from_millis(100),
        }
    }
}

/// Hot layout update, see [`VirtualGrid::update_config`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridConfigUpdate {
    pub min_item_width: Option<f32>,
    pub gap: Option<f32>,
    /// Shrinking evicts the oldest pooled cells
    pub max_pool_size: Option<usize>,
}

/// Counters for what the grid did. Also the place where failures that are
/// not propagated get counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub passes: u64,
    /// Cell wrappers constructed
    pub created: u64,
    /// Calls of the creation factory
    pub factory_calls: u64,
    pub updated: u64,
    pub recycled: u64,
    /// Cells dropped because the pool was full or a forced reset happened
    pub discarded: u64,
    pub render_failures: u64,
    pub store_failures: u64,
}

/// Scroll geometry reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub container_width: f32,
    pub scroll_root_width: f32,
    pub viewport_height: f32,
    pub scroll_offset: f32,
}

/// Where the load-more sentinel sits relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentinelProbe {
    /// Pixels between the viewport bottom and the end of the content.
    /// Negative when the content is shorter than the viewport.
    pub distance: f32,
    /// Content fills at least one screen
    pub viewport_filled: bool,
}

/// Notifications for collaborators (details panel, summary bar, the host scroll root)
#[derive(Debug, Clone, PartialEq)]
pub enum GridMessage {
    SelectionChanged(Selection),
    LayoutChanged(LayoutMetrics),
    /// The host should move its scroll root to this offset
    ScrollTo(f32),
    RenderFailed(RenderItemError),
}

/// Virtualized grid: materializes only the cells around the viewport and
/// recycles them while scrolling.
pub struct VirtualGrid<R: GridRecord, H: CellRenderer<R>, F: FrameScheduler> {
    config: GridConfig,
    renderer: H,
    scheduler: F,
    store: Box<dyn SelectionStore>,

    items: Items<R>,
    geometry: Geometry,
    has_geometry: bool,
    metrics: LayoutMetrics,
    sampler: MetaHeightSampler,
    window: RenderWindow,

    /// index -> materialized cell
    cells: HashMap<usize, Cell<R, H::Node>>,
    pool: CellPool<R, H::Node>,
    render_loop: RenderLoop,

    selection: Selection,
    stats: GridStats,
    messages: Vec<GridMessage>,
    disposed: bool,
}

impl<R: GridRecord, H: CellRenderer<R>, F: FrameScheduler> VirtualGrid<R, H, F> {
    pub fn new(config: GridConfig, renderer: H, scheduler: F, store: Box<dyn SelectionStore>) -> Self {
        let selection = store.load();
        let pool = CellPool::new(config.max_pool_size);
        Self {
            config,
            renderer,
            scheduler,
            store,
            items: Arc::new(Vec::new()),
            geometry: Geometry::default(),
            has_geometry: false,
            metrics: LayoutMetrics::default(),
            sampler: MetaHeightSampler::new(),
            window: RenderWindow::EMPTY,
            cells: HashMap::new(),
            pool,
            render_loop: RenderLoop::new(),
            selection,
            stats: GridStats::default(),
            messages: Vec::new(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn items(&self) -> &Items<R> {
        &self.items
    }

    pub fn metrics(&self) -> LayoutMetrics {
        self.metrics
    }

    pub fn window(&self) -> RenderWindow {
        self.window
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn stats(&self) -> GridStats {
        self.stats
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn renderer(&self) -> &H {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut H {
        &mut self.renderer
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut F {
        &mut self.scheduler
    }

    /// Takes the queued notifications
    pub fn drain_messages(&mut self) -> Vec<GridMessage> {
        std::mem::take(&mut self.messages)
    }

    /// Height of the whole grid for the current item count
    pub fn content_height(&self) -> f32 {
        self.metrics.content_height(self.items.len(), self.config.gap)
    }

    // ==================== Host signals ====================

    /// Container or scroll root changed size. The first report lays out
    /// right away, later ones are debounced.
    pub fn on_resize(&mut self, container_width: f32, scroll_root_width: f32, viewport_height: f32, now: Instant) {
        if self.disposed {
            return;
        }
        let width_changed = (self.geometry.container_width - container_width).abs() >= 0.5
            || (self.geometry.scroll_root_width - scroll_root_width).abs() >= 0.5;
        self.geometry.container_width = container_width;
        self.geometry.scroll_root_width = scroll_root_width;
        self.geometry.viewport_height = viewport_height.max(0.0);

        if !self.has_geometry {
            self.has_geometry = true;
            self.relayout();
            self.render_loop.request_render(&mut self.scheduler);
        } else if width_changed {
            self.render_loop.request_debounced_layout(now, self.config.resize_debounce, &mut self.scheduler);
            self.render_loop.request_render(&mut self.scheduler);
        } else {
            self.render_loop.request_render(&mut self.scheduler);
        }
    }

    pub fn on_scroll(&mut self, offset: f32) {
        if self.disposed {
            return;
        }
        let max_scroll = (self.content_height() - self.geometry.viewport_height).max(0.0);
        self.geometry.scroll_offset = if offset.is_finite() { offset.clamp(0.0, max_scroll) } else { 0.0 };
        self.render_loop.request_render(&mut self.scheduler);
    }

    /// Frame callback from the host. Runs at most one layout and one render pass.
    pub fn frame(&mut self, token: FrameToken, now: Instant) {
        if self.disposed {
            return;
        }
        let Some(work) = self.render_loop.begin_frame(token, now, &mut self.scheduler) else {
            log::trace!("[VirtualGrid] ignoring stale frame {:?}", token);
            return;
        };
        if work.relayout {
            self.relayout();
        }
        if work.render {
            self.render_pass();
        }
    }

    // ==================== Public operations ====================

    /// Replaces the dataset. With `force` every materialized and pooled cell is
    /// thrown away so each card is rebuilt by the factory; otherwise
    /// reconciliation keeps whatever still matches.
    pub fn set_items(&mut self, items: Items<R>, force: bool) {
        if self.disposed {
            return;
        }
        if !force && Arc::ptr_eq(&self.items, &items) {
            return;
        }
        if force {
            for (_, mut cell) in self.cells.drain() {
                self.renderer.recycled(&mut cell);
                self.stats.recycled += 1;
                self.stats.discarded += 1;
            }
            // pooled cells already went through the recycled hook
            self.stats.discarded += self.pool.drain().count() as u64;
            self.window = RenderWindow::EMPTY;
        }
        self.items = items;
        if self.items.is_empty() && self.geometry.scroll_offset != 0.0 {
            self.geometry.scroll_offset = 0.0;
            self.messages.push(GridMessage::ScrollTo(0.0));
        }
        self.relayout();
        self.render_loop.request_render(&mut self.scheduler);
    }

    /// Hot layout update. With `relayout` the new layout is applied in this
    /// call, otherwise on the next frame.
    pub fn update_config(&mut self, update: GridConfigUpdate, relayout: bool) {
        if self.disposed {
            return;
        }
        if let Some(min_item_width) = update.min_item_width {
            if min_item_width.is_finite() && min_item_width > 0.0 {
                self.config.min_item_width = min_item_width;
            } else {
                log::warn!("[VirtualGrid] ignoring invalid min item width {min_item_width}");
            }
        }
        if let Some(gap) = update.gap {
            if gap.is_finite() && gap >= 0.0 {
                self.config.gap = gap;
            } else {
                log::warn!("[VirtualGrid] ignoring invalid gap {gap}");
            }
        }
        if let Some(max_pool_size) = update.max_pool_size {
            self.config.max_pool_size = max_pool_size;
            let evicted = self.pool.set_max_size(max_pool_size);
            if !evicted.is_empty() {
                log::debug!("[VirtualGrid] pool shrunk to {max_pool_size}, dropping {} cells", evicted.len());
                self.stats.discarded += evicted.len() as u64;
            }
        }

        if relayout {
            self.relayout();
            self.render_pass();
        } else {
            self.render_loop.request_layout(&mut self.scheduler);
        }
    }

    /// Programmatic scroll that brings the row of `index` into view
    pub fn scroll_to_index(&mut self, index: usize) {
        if self.disposed || index >= self.items.len() {
            return;
        }
        let stride = self.metrics.row_stride(self.config.gap);
        let row_top = row_of(index, &self.metrics) as f32 * stride;
        let row_bottom = row_top + self.metrics.row_height;
        let view_top = self.geometry.scroll_offset;
        let view_bottom = view_top + self.geometry.viewport_height;

        let target = if row_top < view_top {
            row_top
        } else if row_bottom > view_bottom {
            (row_bottom - self.geometry.viewport_height).max(0.0)
        } else {
            return;
        };

        self.scroll_to_offset(target);
    }

    /// Programmatic scroll to an absolute offset, clamped to the content
    pub fn scroll_to_offset(&mut self, offset: f32) {
        if self.disposed {
            return;
        }
        let max_scroll = (self.content_height() - self.geometry.viewport_height).max(0.0);
        let target = if offset.is_finite() { offset.clamp(0.0, max_scroll) } else { 0.0 };
        self.geometry.scroll_offset = target;
        self.messages.push(GridMessage::ScrollTo(target));
        self.render_loop.request_render(&mut self.scheduler);
    }

    /// Currently materialized cells, in index order
    pub fn rendered_cards(&self) -> Vec<(usize, &Cell<R, H::Node>)> {
        let mut cards: Vec<_> = self.cells.iter().map(|(index, cell)| (*index, cell)).collect();
        cards.sort_by_key(|(index, _)| *index);
        cards
    }

    pub fn rendered_card(&self, index: usize) -> Option<&Cell<R, H::Node>> {
        self.cells.get(&index)
    }

    /// Mutable access for host effects such as `transform`. Placement is
    /// owned by the grid and gets overwritten on the next pass.
    pub fn rendered_card_mut(&mut self, index: usize) -> Option<&mut Cell<R, H::Node>> {
        self.cells.get_mut(&index)
    }

    /// Replaces the selection, persists it and refreshes the visible cells only.
    pub fn set_selection(&mut self, selection: Selection) {
        if self.disposed {
            return;
        }
        self.selection = selection;
        if let Err(err) = self.store.save(&self.selection) {
            self.stats.store_failures += 1;
            log::warn!("[VirtualGrid] failed to persist selection: {err}");
        }
        for cell in self.cells.values_mut() {
            if apply_selection(&self.selection, cell) {
                self.renderer.selection_applied(cell);
            }
        }
        self.messages.push(GridMessage::SelectionChanged(self.selection.clone()));
    }

    /// Record data changed behind the grid's back (async enrichment).
    /// Re-runs the update hook on the cell showing it, if any.
    pub fn record_changed(&mut self, key: &RecordKey) {
        if self.disposed {
            return;
        }
        for cell in self.cells.values_mut() {
            if !cell.shows_key(key) {
                continue;
            }
            if let Some(record) = cell.record().cloned() {
                apply_selection(&self.selection, cell);
                self.renderer.updated(&record, cell);
                self.stats.updated += 1;
            }
        }
    }

    /// Ask for one more round of height sampling before the meta height locks
    pub fn request_remeasure(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.sampler.request_remeasure()
    }

    /// Forgets the locked meta height so the next fresh cells are sampled again
    pub fn reset_measurement(&mut self) {
        if self.disposed {
            return;
        }
        self.sampler.reset();
        self.relayout();
        self.render_loop.request_render(&mut self.scheduler);
    }

    pub fn sentinel_probe(&self) -> SentinelProbe {
        let content_height = self.content_height();
        let view_bottom = self.geometry.scroll_offset + self.geometry.viewport_height;
        SentinelProbe {
            distance: content_height - view_bottom,
            viewport_filled: !self.items.is_empty() && content_height >= self.geometry.viewport_height,
        }
    }

    /// Full teardown. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.render_loop.dispose(&mut self.scheduler);
        for (_, mut cell) in self.cells.drain() {
            self.renderer.recycled(&mut cell);
            self.stats.recycled += 1;
        }
        self.pool.drain().for_each(drop);
        self.window = RenderWindow::EMPTY;
        self.messages.clear();
        log::debug!("[VirtualGrid] disposed after {} passes", self.stats.passes);
    }

    // ==================== Internals ====================

    fn relayout(&mut self) {
        let input = LayoutInput {
            container_width: self.geometry.container_width,
            scroll_root_width: self.geometry.scroll_root_width,
            min_item_width: self.config.min_item_width,
            gap: self.config.gap,
            padding: self.config.padding,
            details_strip: self.config.details_strip,
        };
        let metrics = compute_layout(&input, self.sampler.locked_value().unwrap_or(0.0), self.sampler.is_locked());
        if metrics != self.metrics {
            log::debug!(
                "[VirtualGrid] layout {} columns, item {}px, row {}px",
                metrics.column_count,
                metrics.item_width,
                metrics.row_height
            );
            self.metrics = metrics;
            self.messages.push(GridMessage::LayoutChanged(metrics));
            self.place_cells();
        }
    }

    fn place_cells(&mut self) {
        for (index, cell) in self.cells.iter_mut() {
            cell.placement = cell_placement(*index, &self.metrics, self.config.gap);
        }
    }

    fn recycle(&mut self, mut cell: Cell<R, H::Node>) {
        self.renderer.recycled(&mut cell);
        self.stats.recycled += 1;
        if self.pool.put(cell).is_some() {
            self.stats.discarded += 1;
        }
    }

    /// One synchronous reconciliation of the materialized cells against the window.
    fn render_pass(&mut self) {
        self.stats.passes += 1;
        let gap = self.config.gap;
        let scroll = ScrollState {
            offset: self.geometry.scroll_offset,
            viewport_height: self.geometry.viewport_height,
        };
        let window = compute_window(&self.metrics, gap, scroll, self.config.buffer_rows, self.items.len());

        // cells outside the new window go first so they can be reused below
        let stale: Vec<usize> = self.cells.keys().copied().filter(|index| !window.contains(*index)).collect();
        for index in stale {
            if let Some(cell) = self.cells.remove(&index) {
                self.recycle(cell);
            }
        }

        let items = self.items.clone();
        let mut lock_engaged = false;
        for index in window.range() {
            let record = &items[index];
            let key = record.key();

            if let Some(cell) = self.cells.get_mut(&index) {
                if cell.shows_key(&key) {
                    let same_ref = cell.record().is_some_and(|current| Arc::ptr_eq(current, record));
                    if !same_ref {
                        cell.set_record(record.clone());
                        apply_selection(&self.selection, cell);
                        self.renderer.updated(record, cell);
                        self.stats.updated += 1;
                    }
                    cell.placement = cell_placement(index, &self.metrics, gap);
                    continue;
                }
                if let Some(cell) = self.cells.remove(&index) {
                    self.recycle(cell);
                }
            }

            let (mut cell, fresh_wrapper) = match self.pool.take() {
                Some(cell) => (cell, false),
                None => {
                    self.stats.created += 1;
                    (Cell::new(), true)
                }
            };
            cell.tag(index, record.clone(), key);
            apply_selection(&self.selection, &mut cell);

            if cell.node.is_some() {
                self.renderer.updated(record, &mut cell);
                self.stats.updated += 1;
            } else {
                self.stats.factory_calls += 1;
                match self.renderer.create(record, index) {
                    Ok(node) => cell.node = Some(node),
                    Err(err) => {
                        log::error!("[VirtualGrid] {err}; showing placeholder");
                        self.stats.render_failures += 1;
                        self.messages.push(GridMessage::RenderFailed(err));
                    }
                }
            }

            cell.placement = cell_placement(index, &self.metrics, gap);
            cell.attach();
            if cell.node.is_some() {
                self.renderer.rendered(record, &mut cell);
                if fresh_wrapper && self.sampler.wants_samples() {
                    if let Some(height) = self.renderer.measure(&cell) {
                        lock_engaged |= self.sampler.push(height, self.metrics.item_width, self.config.details_strip).is_some();
                    }
                }
            }
            self.cells.insert(index, cell);
        }
        self.window = window;

        if lock_engaged {
            self.relayout();
            // row height changed, the window may cover different rows now
            self.render_loop.request_render(&mut self.scheduler);
        }
        log::trace!("[VirtualGrid] pass {} window {:?} pool {}", self.stats.passes, self.window, self.pool.len());
    }
}

/// Copies selection membership onto the cell. Returns true if a flag changed.
fn apply_selection<R: GridRecord, N>(selection: &Selection, cell: &mut Cell<R, N>) -> bool {
    let Some(record) = cell.record() else {
        return false;
    };
    let id = record.selection_id();
    let selected = selection.contains(&id);
    let active = selection.is_active(&id);
    let changed = selected != cell.selected || active != cell.active;
    cell.selected = selected;
    cell.active = active;
    changed
}
