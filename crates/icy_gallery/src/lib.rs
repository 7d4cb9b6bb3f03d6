//! Virtualized gallery grid with incremental pagination.
//!
//! The grid shows tens of thousands of records while only materializing the
//! cells around the viewport. Cells leaving the window are recycled, new pages
//! are fetched when the end of the content comes close, and the selection is
//! kept outside the cells so recycling can't lose it.

pub mod enrichment;
pub mod error;
pub mod gallery;
pub mod grid;
pub mod layout;
pub mod loader;
pub mod options;
pub mod pool;
pub mod record;
pub mod render_loop;
pub mod renderer;
pub mod selection;
pub mod window;

pub use enrichment::{EnrichmentQueue, ExtensionTable, SharedExtensions};
pub use error::{FetchError, GalleryError, GalleryResult, RenderItemError};
pub use gallery::Gallery;
pub use grid::{Geometry, GridConfig, GridConfigUpdate, GridMessage, GridStats, SentinelProbe, VirtualGrid};
pub use layout::{LayoutInput, LayoutMetrics, MetaHeightSampler, compute_layout};
pub use loader::{BootstrapPolicy, LoadStatus, LoaderConfig, LoaderEvent, LoaderState, Page, PageLoader, PageQuery, PageSource, RequestContext, VecSource};
pub use options::Options;
pub use pool::{Cell, CellPool};
pub use record::{GridRecord, Items, MediaRecord, RecordKey, items_from};
pub use render_loop::{FrameScheduler, FrameToken, ManualScheduler, RenderLoop};
pub use renderer::CellRenderer;
pub use selection::{MemorySelectionStore, Selection, SelectionStore};
pub use window::{Placement, RenderWindow, ScrollState, cell_placement, compute_window};

use semver::Version;

lazy_static::lazy_static! {
    pub static ref VERSION: Version = Version::parse(env!("CARGO_PKG_VERSION")).unwrap();
}
