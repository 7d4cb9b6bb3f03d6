//! Grid layout calculation
//!
//! Derives column count, item width and row height from the container geometry.
//! All cells share one row height so that positions stay a pure function of the
//! index, which is what makes windowing over 100k records cheap.

/// Extra space subtracted from the container width to avoid a horizontal
/// scrollbar from sub-pixel rounding.
pub const SAFETY_MARGIN: f32 = 1.0;

/// Reserved meta height in details mode until real cells have been measured
pub const DETAILS_MIN_META_HEIGHT: f32 = 48.0;

/// Number of measurements needed before the meta height is locked
pub const MEASURE_SAMPLES: usize = 3;

/// Geometry inputs for one layout pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutInput {
    /// Width of the grid container
    pub container_width: f32,
    /// Client width of the scroll root; the grid never grows wider than this
    pub scroll_root_width: f32,
    pub min_item_width: f32,
    pub gap: f32,
    pub padding: f32,
    pub details_strip: bool,
}

/// Result of a layout pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub column_count: usize,
    pub item_width: f32,
    pub row_height: f32,
    /// Vertical space below the square media area (labels, badges, details strip)
    pub meta_height: f32,
    /// Latched once enough cells have been measured
    pub measured: bool,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            column_count: 1,
            item_width: 0.0,
            row_height: 0.0,
            meta_height: 0.0,
            measured: false,
        }
    }
}

impl LayoutMetrics {
    /// Distance from one row's top to the next
    pub fn row_stride(&self, gap: f32) -> f32 {
        self.row_height + gap
    }

    /// Total height of the content for `item_count` items
    pub fn content_height(&self, item_count: usize, gap: f32) -> f32 {
        if item_count == 0 {
            return 0.0;
        }
        let rows = item_count.div_ceil(self.column_count.max(1));
        (rows as f32 * self.row_stride(gap) - gap).max(0.0)
    }
}

/// Number of columns that fit into the available width.
/// N * min_width + (N-1) * gap <= available  =>  N <= (available + gap) / (min_width + gap)
pub fn columns_for_width(available_width: f32, min_item_width: f32, gap: f32) -> usize {
    let denom = min_item_width + gap;
    if denom <= 0.0 || denom.is_nan() || !available_width.is_finite() {
        return 1;
    }
    ((available_width + gap) / denom).floor().max(1.0) as usize
}

/// Computes the layout metrics. Never fails: degenerate input degrades to a
/// single zero-width column.
pub fn compute_layout(input: &LayoutInput, meta_height: f32, measured: bool) -> LayoutMetrics {
    let mut available = input.container_width - input.padding - SAFETY_MARGIN;
    if input.scroll_root_width > 0.0 {
        available = available.min(input.scroll_root_width);
    }
    let available = if available.is_finite() { available.max(0.0) } else { 0.0 };

    let column_count = columns_for_width(available, input.min_item_width, input.gap);
    let item_width = ((available - (column_count - 1) as f32 * input.gap) / column_count as f32).floor().max(0.0);

    let meta_height = if measured {
        meta_height
    } else if input.details_strip {
        meta_height.max(DETAILS_MIN_META_HEIGHT)
    } else {
        meta_height
    };

    LayoutMetrics {
        column_count,
        item_width,
        row_height: item_width + meta_height,
        meta_height,
        measured,
    }
}

/// Collects the height of the first few created cells and locks the meta
/// height to their median. After the lock, later content churn (badges that
/// hydrate asynchronously, long titles) can't move rows around anymore.
#[derive(Debug, Clone, Default)]
pub struct MetaHeightSampler {
    samples: Vec<f32>,
    locked: Option<f32>,
    remeasure_used: bool,
}

impl MetaHeightSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub fn locked_value(&self) -> Option<f32> {
        self.locked
    }

    pub fn wants_samples(&self) -> bool {
        self.locked.is_none()
    }

    /// Feed one measurement. Returns the locked meta height when this sample
    /// completes the set.
    pub fn push(&mut self, cell_height: f32, item_width: f32, details_strip: bool) -> Option<f32> {
        if self.locked.is_some() || !cell_height.is_finite() {
            return None;
        }
        self.samples.push((cell_height - item_width).max(0.0));
        if self.samples.len() < MEASURE_SAMPLES {
            return None;
        }

        self.samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mut median = self.samples[self.samples.len() / 2];
        if details_strip {
            median = median.max(DETAILS_MIN_META_HEIGHT);
        }
        self.locked = Some(median);
        self.samples.clear();
        Some(median)
    }

    /// Drops collected samples so they are taken again. Only honored once and
    /// only before the lock engaged.
    pub fn request_remeasure(&mut self) -> bool {
        if self.locked.is_some() || self.remeasure_used {
            return false;
        }
        self.remeasure_used = true;
        self.samples.clear();
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
