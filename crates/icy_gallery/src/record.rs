use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identity of a record.
///
/// Records coming from the server usually carry an explicit id. Local files
/// that were never indexed don't, so they are identified by where they live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    Id(String),
    Composite { kind: String, root: String, path: String, name: String },
}

impl RecordKey {
    pub fn id(id: impl Into<String>) -> Self {
        RecordKey::Id(id.into())
    }

    pub fn composite(kind: impl Into<String>, root: impl Into<String>, path: impl Into<String>, name: impl Into<String>) -> Self {
        RecordKey::Composite {
            kind: kind.into(),
            root: root.into(),
            path: path.into(),
            name: name.into(),
        }
    }

    /// The explicit id, if the record has one
    pub fn as_id(&self) -> Option<&str> {
        match self {
            RecordKey::Id(id) => Some(id),
            RecordKey::Composite { .. } => None,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{id}"),
            RecordKey::Composite { kind, root, path, name } => write!(f, "{kind}|{root}|{path}|{name}"),
        }
    }
}

/// A data item shown as one cell of the grid.
///
/// The grid treats records as opaque. It only needs an identity to decide
/// whether a materialized cell still shows the right thing.
pub trait GridRecord: Send + Sync + 'static {
    fn key(&self) -> RecordKey;

    /// String used for selection membership. Defaults to the key's display form.
    fn selection_id(&self) -> String {
        self.key().to_string()
    }
}

/// The index-addressable record sequence handed to the grid.
///
/// Always replaced as a whole, never mutated in place by the grid.
pub type Items<R> = Arc<Vec<Arc<R>>>;

/// Wraps a plain list into an [`Items`] value.
pub fn items_from<R>(records: Vec<R>) -> Items<R> {
    Arc::new(records.into_iter().map(Arc::new).collect())
}

/// Generic media record, used by the simulator and by hosts that don't need
/// their own record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MediaRecord {
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: "output".to_string(),
            root: String::new(),
            path: String::new(),
            name: name.into(),
            rating: None,
            tags: Vec::new(),
        }
    }
}

impl GridRecord for MediaRecord {
    fn key(&self) -> RecordKey {
        match &self.id {
            Some(id) if !id.is_empty() => RecordKey::Id(id.clone()),
            _ => RecordKey::composite(&self.kind, &self.root, &self.path, &self.name),
        }
    }
}
