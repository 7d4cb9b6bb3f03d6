//! Error types for icy_gallery

use thiserror::Error;

/// Failure reported by a [`crate::PageSource`] while fetching a page.
///
/// Fetch errors are never fatal: the loader keeps its offset, stays not-done
/// and offers a retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed page: {0}")]
    Malformed(String),

    /// The request was cancelled because the query was reset or the loader disposed.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Cancellation caused by a reset is expected and must not surface as an error state.
    pub fn is_benign(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// A single record could not be turned into a visual node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to render item {index}: {message}")]
pub struct RenderItemError {
    pub index: usize,
    pub message: String,
}

impl RenderItemError {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self { index, message: message.into() }
    }
}

/// Errors at the crate boundary (options, selection persistence, simulator input).
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid options file: {0}")]
    OptionsParse(#[from] toml::de::Error),

    #[error("can't serialize options: {0}")]
    OptionsWrite(#[from] toml::ser::Error),

    #[error("no configuration directory available")]
    NoConfigDir,
}

pub type GalleryResult<T> = Result<T, GalleryError>;
