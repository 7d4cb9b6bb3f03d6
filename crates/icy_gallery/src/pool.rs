//! Cells and the cell pool
//!
//! A [`Cell`] is the positioned wrapper around one rendered node. Cells leave
//! the render window all the time while scrolling; instead of dropping them
//! they go back into a [`CellPool`] and get handed to the next index that
//! enters the window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::record::RecordKey;
use crate::window::Placement;

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique cell id
pub fn new_cell_id() -> u64 {
    NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Positioned wrapper around one rendered node.
pub struct Cell<R, N> {
    /// Unique per wrapper; survives recycling
    id: u64,
    /// Rendered node. `None` is the empty placeholder used when creation failed.
    pub node: Option<N>,
    /// Record currently displayed, compared by pointer for reuse detection
    record: Option<Arc<R>>,
    key: Option<RecordKey>,
    index: Option<usize>,
    /// Absolute offsets written by the placement pass
    pub placement: Placement,
    /// Owned by highlight effects. Placement never writes here.
    pub transform: Option<[f32; 6]>,
    pub selected: bool,
    pub active: bool,
    attached: bool,
}

impl<R, N> Cell<R, N> {
    pub(crate) fn new() -> Self {
        Self {
            id: new_cell_id(),
            node: None,
            record: None,
            key: None,
            index: None,
            placement: Placement::default(),
            transform: None,
            selected: false,
            active: false,
            attached: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn record(&self) -> Option<&Arc<R>> {
        self.record.as_ref()
    }

    pub fn key(&self) -> Option<&RecordKey> {
        self.key.as_ref()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_placeholder(&self) -> bool {
        self.node.is_none()
    }

    /// True if this cell shows exactly `record` (same key)
    pub(crate) fn shows_key(&self, key: &RecordKey) -> bool {
        self.key.as_ref() == Some(key)
    }

    pub(crate) fn tag(&mut self, index: usize, record: Arc<R>, key: RecordKey) {
        self.index = Some(index);
        self.record = Some(record);
        self.key = Some(key);
    }

    pub(crate) fn set_record(&mut self, record: Arc<R>) {
        self.record = Some(record);
    }

    pub(crate) fn attach(&mut self) {
        self.attached = true;
    }

    /// Clears tags and flags so the wrapper can show another record.
    /// The node is kept for reuse.
    pub(crate) fn reset(&mut self) {
        self.attached = false;
        self.record = None;
        self.key = None;
        self.index = None;
        self.selected = false;
        self.active = false;
        self.transform = None;
    }
}

/// Capped pool of detached cells.
pub struct CellPool<R, N> {
    cells: VecDeque<Cell<R, N>>,
    max_size: usize,
}

impl<R, N> CellPool<R, N> {
    pub fn new(max_size: usize) -> Self {
        Self {
            cells: VecDeque::with_capacity(max_size.min(256)),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Takes the most recently returned cell
    pub fn take(&mut self) -> Option<Cell<R, N>> {
        self.cells.pop_back()
    }

    /// Returns a detached cell to the pool. When the pool is full the cell
    /// is handed back and the caller drops it.
    pub fn put(&mut self, mut cell: Cell<R, N>) -> Option<Cell<R, N>> {
        cell.reset();
        if self.cells.len() >= self.max_size {
            return Some(cell);
        }
        self.cells.push_back(cell);
        None
    }

    /// Shrinks the pool to a new cap, returning the evicted cells
    pub fn set_max_size(&mut self, max_size: usize) -> Vec<Cell<R, N>> {
        self.max_size = max_size;
        let mut evicted = Vec::new();
        while self.cells.len() > self.max_size {
            if let Some(cell) = self.cells.pop_front() {
                evicted.push(cell);
            }
        }
        evicted
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Cell<R, N>> + '_ {
        self.cells.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_capped() {
        let mut pool: CellPool<(), u32> = CellPool::new(2);
        let a = Cell::new();
        let b = Cell::new();
        let c = Cell::new();
        let c_id = c.id();
        assert!(pool.put(a).is_none());
        assert!(pool.put(b).is_none());
        let rejected = pool.put(c).expect("pool full");
        assert_eq!(rejected.id(), c_id);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn shrinking_evicts_oldest_first() {
        let mut pool: CellPool<(), u32> = CellPool::new(3);
        let a = Cell::new();
        let a_id = a.id();
        pool.put(a);
        pool.put(Cell::new());
        pool.put(Cell::new());
        let evicted = pool.set_max_size(2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id(), a_id);
    }

    #[test]
    fn put_resets_tags() {
        let mut pool: CellPool<u8, u32> = CellPool::new(4);
        let mut cell = Cell::new();
        cell.node = Some(7);
        cell.tag(3, Arc::new(1u8), RecordKey::id("x"));
        cell.selected = true;
        cell.attach();
        pool.put(cell);
        let cell = pool.take().expect("pooled cell");
        assert_eq!(cell.node, Some(7));
        assert!(cell.record().is_none());
        assert!(cell.index().is_none());
        assert!(!cell.selected);
        assert!(!cell.is_attached());
    }

    #[test]
    fn zero_cap_pool_rejects_everything() {
        let mut pool: CellPool<(), u32> = CellPool::new(0);
        assert!(pool.put(Cell::new()).is_some());
        assert!(pool.is_empty());
    }
}
