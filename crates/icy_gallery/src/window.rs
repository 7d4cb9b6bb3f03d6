//! Render window and cell placement

use std::ops::Range;

use crate::layout::LayoutMetrics;

/// Half-open index range `[start, end)` that is currently materialized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderWindow {
    pub start: usize,
    pub end: usize,
}

impl RenderWindow {
    pub const EMPTY: RenderWindow = RenderWindow { start: 0, end: 0 };

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Scroll state of the viewport, in content pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollState {
    pub offset: f32,
    pub viewport_height: f32,
}

/// Computes the window of indices to materialize, including `buffer_rows`
/// extra rows above and below the visible area.
pub fn compute_window(metrics: &LayoutMetrics, gap: f32, scroll: ScrollState, buffer_rows: usize, item_count: usize) -> RenderWindow {
    if item_count == 0 {
        return RenderWindow::EMPTY;
    }
    let columns = metrics.column_count.max(1);
    let stride = metrics.row_stride(gap);
    if stride <= 0.0 || !stride.is_finite() {
        return RenderWindow::EMPTY;
    }

    // float to int casts saturate, so huge offsets land on usize::MAX
    let total_rows = item_count.div_ceil(columns);
    let offset = scroll.offset.max(0.0);
    let first_row = ((offset / stride).floor() as usize).min(total_rows);
    let start_row = first_row.saturating_sub(buffer_rows);
    let visible_rows = ((scroll.viewport_height.max(0.0) / stride).ceil() as usize).min(total_rows);
    let end_row = start_row.saturating_add(visible_rows).saturating_add(buffer_rows);

    let end = item_count.min(end_row.saturating_add(1).saturating_mul(columns));
    let start = (start_row.saturating_mul(columns)).min(end);
    RenderWindow { start, end }
}

/// Absolute position and size of one cell
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Position of the cell at `index`. Pure function of the index and the layout.
pub fn cell_placement(index: usize, metrics: &LayoutMetrics, gap: f32) -> Placement {
    let columns = metrics.column_count.max(1);
    let row = index / columns;
    let col = index % columns;
    Placement {
        left: col as f32 * (metrics.item_width + gap),
        top: row as f32 * (metrics.row_height + gap),
        width: metrics.item_width,
        height: metrics.row_height,
    }
}

/// Row index of `index`
pub fn row_of(index: usize, metrics: &LayoutMetrics) -> usize {
    index / metrics.column_count.max(1)
}
