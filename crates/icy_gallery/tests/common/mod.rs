#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use icy_gallery::{
    Cell, CellRenderer, FetchError, Gallery, GridConfig, Items, ManualScheduler, MediaRecord, MemorySelectionStore, Page, PageQuery, PageSource,
    RenderItemError, RequestContext, VirtualGrid, items_from,
};

pub const WIDTH: f32 = 1000.0;
pub const HEIGHT: f32 = 600.0;

/// 1000px wide, 600px high with default config: 7 columns of 134px, row
/// stride 144, 8 rows (56 cells) materialized.
pub const WINDOW_CELLS: usize = 56;

/// Renderer that counts every hook call and hands out distinct node ids
#[derive(Default)]
pub struct TestRenderer {
    pub created: usize,
    pub rendered: usize,
    pub updated: usize,
    pub recycled: usize,
    pub selection_applied: usize,
    /// Record ids whose creation fails
    pub fail_ids: HashSet<String>,
    /// Reported cell height, if any
    pub measure_height: Option<f32>,
    next_node: u64,
}

impl CellRenderer<MediaRecord> for TestRenderer {
    type Node = u64;

    fn create(&mut self, record: &MediaRecord, index: usize) -> Result<u64, RenderItemError> {
        if record.id.as_ref().is_some_and(|id| self.fail_ids.contains(id)) {
            return Err(RenderItemError::new(index, "broken thumbnail"));
        }
        self.created += 1;
        self.next_node += 1;
        Ok(self.next_node)
    }

    fn rendered(&mut self, _record: &MediaRecord, _cell: &mut Cell<MediaRecord, u64>) {
        self.rendered += 1;
    }

    fn updated(&mut self, _record: &MediaRecord, _cell: &mut Cell<MediaRecord, u64>) {
        self.updated += 1;
    }

    fn recycled(&mut self, _cell: &mut Cell<MediaRecord, u64>) {
        self.recycled += 1;
    }

    fn selection_applied(&mut self, _cell: &mut Cell<MediaRecord, u64>) {
        self.selection_applied += 1;
    }

    fn measure(&self, _cell: &Cell<MediaRecord, u64>) -> Option<f32> {
        self.measure_height
    }
}

pub type TestGrid = VirtualGrid<MediaRecord, TestRenderer, ManualScheduler>;

pub fn test_grid(config: GridConfig) -> TestGrid {
    VirtualGrid::new(config, TestRenderer::default(), ManualScheduler::new(), Box::new(MemorySelectionStore::new()))
}

/// Default grid that already received its first size report
pub fn sized_grid() -> TestGrid {
    let mut grid = test_grid(GridConfig::default());
    grid.on_resize(WIDTH, WIDTH, HEIGHT, Instant::now());
    grid
}

/// Runs frame callbacks until no more are requested (bounded, the resize
/// debounce keeps asking for frames until its deadline).
pub fn pump(grid: &mut TestGrid, now: Instant) {
    for _ in 0..8 {
        let due = grid.scheduler_mut().take_due();
        if due.is_empty() {
            break;
        }
        for token in due {
            grid.frame(token, now);
        }
    }
}

pub fn pump_gallery<S: PageSource<MediaRecord>>(gallery: &mut Gallery<MediaRecord, TestRenderer, ManualScheduler, S>, now: Instant) {
    for _ in 0..8 {
        let due = gallery.grid_mut().scheduler_mut().take_due();
        if due.is_empty() {
            break;
        }
        for token in due {
            gallery.frame(token, now);
        }
    }
}

pub fn records(range: std::ops::Range<usize>) -> Vec<MediaRecord> {
    range.map(|i| MediaRecord::with_id(i.to_string(), format!("{i}.png"))).collect()
}

pub fn items(count: usize) -> Items<MediaRecord> {
    items_from(records(0..count))
}

pub fn items_of(ids: &[&str]) -> Items<MediaRecord> {
    items_from(ids.iter().map(|id| MediaRecord::with_id(*id, format!("{id}.png"))).collect())
}

/// Ids shown by the materialized cells, in index order
pub fn shown_ids(grid: &TestGrid) -> Vec<String> {
    grid.rendered_cards()
        .into_iter()
        .filter_map(|(_, cell)| cell.record().and_then(|record| record.id.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
    pub scope: String,
    pub limit: usize,
    pub offset: usize,
}

type Scripted = Result<Page<MediaRecord>, FetchError>;

/// Page source answering from scripted responses, per query scope.
/// Once a scope runs out of responses it returns empty pages.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<FetchCall>>,
    delay: Duration,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_page(&self, scope: &str, records: Vec<MediaRecord>, total: Option<usize>) {
        self.pages.lock().entry(scope.to_string()).or_default().push_back(Ok(Page::new(records, total)));
    }

    pub fn push_error(&self, scope: &str, err: FetchError) {
        self.pages.lock().entry(scope.to_string()).or_default().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PageSource<MediaRecord> for ScriptedSource {
    async fn fetch_page(&self, query: &PageQuery, limit: usize, offset: usize, _ctx: RequestContext) -> Result<Page<MediaRecord>, FetchError> {
        self.calls.lock().push(FetchCall {
            scope: query.scope.clone(),
            limit,
            offset,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.pages.lock().get_mut(&query.scope).and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(Page::new(Vec::new(), None)))
    }
}
