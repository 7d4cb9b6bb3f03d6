use crate::error::RenderItemError;
use crate::pool::Cell;

/// Host side of the grid: turns records into nodes and reacts to lifecycle events.
///
/// The grid owns cells and decides when they are created, reused and
/// recycled. The renderer owns what is inside them.
pub trait CellRenderer<R> {
    /// Rendered node type (a DOM element handle, a widget id, a texture ...)
    type Node;

    /// Builds a node for a cell that never had one.
    fn create(&mut self, record: &R, index: usize) -> Result<Self::Node, RenderItemError>;

    /// A cell was freshly materialized for an index.
    fn rendered(&mut self, _record: &R, _cell: &mut Cell<R, Self::Node>) {}

    /// An existing node must show `record`: either a pooled node reused for a
    /// different record, or the same record with changed data.
    fn updated(&mut self, _record: &R, _cell: &mut Cell<R, Self::Node>) {}

    /// The cell leaves the render window. Fired exactly once per exit, also
    /// when the cell is dropped because the pool is full.
    fn recycled(&mut self, _cell: &mut Cell<R, Self::Node>) {}

    /// Selection flags on a rendered cell changed.
    fn selection_applied(&mut self, _cell: &mut Cell<R, Self::Node>) {}

    /// Total rendered height of the cell, if the host can measure it.
    fn measure(&self, _cell: &Cell<R, Self::Node>) -> Option<f32> {
        None
    }
}
