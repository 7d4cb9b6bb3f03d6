//! Selection state
//!
//! The selection is keyed by stable record id and lives outside the grid, so
//! neither item list replacement nor cell recycling can lose it. Cells only
//! carry a visual copy of the flag, reapplied whenever a cell is created or updated.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GalleryResult;

/// Key under which the selection is persisted on the host container
pub const SELECTION_STORE_KEY: &str = "icy_gallery.selection";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub ids: HashSet<String>,
    /// Focused item (details panel target), not necessarily selected
    pub active: Option<String>,
}

impl Selection {
    pub fn new<I, S>(ids: I, active: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            active,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Host-owned persistence for the selection (a key/value slot on the host container)
pub trait SelectionStore {
    fn load(&self) -> Selection;
    fn save(&mut self, selection: &Selection) -> GalleryResult<()>;
}

/// Key/value store keeping the selection as JSON text.
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    values: HashMap<String, String>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> Option<&str> {
        self.values.get(SELECTION_STORE_KEY).map(String::as_str)
    }
}

impl SelectionStore for MemorySelectionStore {
    fn load(&self) -> Selection {
        let Some(text) = self.values.get(SELECTION_STORE_KEY) else {
            return Selection::default();
        };
        match serde_json::from_str(text) {
            Ok(selection) => selection,
            Err(err) => {
                log::warn!("Discarding unreadable stored selection: {err}");
                Selection::default()
            }
        }
    }

    fn save(&mut self, selection: &Selection) -> GalleryResult<()> {
        let text = serde_json::to_string(selection)?;
        self.values.insert(SELECTION_STORE_KEY.to_string(), text);
        Ok(())
    }
}
