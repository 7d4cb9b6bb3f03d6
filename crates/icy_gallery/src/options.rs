use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, GalleryResult};
use crate::grid::GridConfig;
use crate::loader::{BootstrapPolicy, LoaderConfig};

const OPTIONS_FILE: &str = "options.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Options {
    pub min_item_width: f32,
    pub gap: f32,
    pub buffer_rows: usize,
    pub max_pool_size: usize,
    pub padding: f32,
    pub details_strip: bool,
    pub resize_debounce_ms: u64,

    pub page_size: usize,
    pub load_lookahead: f32,
    pub bootstrap: BootstrapPolicy,
}

impl Default for Options {
    fn default() -> Self {
        let grid = GridConfig::default();
        let loader = LoaderConfig::default();
        Self {
            min_item_width: grid.min_item_width,
            gap: grid.gap,
            buffer_rows: grid.buffer_rows,
            max_pool_size: grid.max_pool_size,
            padding: grid.padding,
            details_strip: grid.details_strip,
            resize_debounce_ms: grid.resize_debounce.as_millis() as u64,
            page_size: loader.page_size,
            load_lookahead: loader.lookahead,
            bootstrap: loader.bootstrap,
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "GitHub", "icy_gallery").map(|dirs| dirs.config_dir().to_path_buf())
}

impl Options {
    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            min_item_width: self.min_item_width,
            gap: self.gap,
            buffer_rows: self.buffer_rows,
            max_pool_size: self.max_pool_size,
            padding: self.padding,
            details_strip: self.details_strip,
            resize_debounce: Duration::from_millis(self.resize_debounce_ms),
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            page_size: self.page_size,
            lookahead: self.load_lookahead,
            bootstrap: self.bootstrap,
        }
    }

    pub fn from_toml(txt: &str) -> GalleryResult<Self> {
        Ok(toml::from_str(txt)?)
    }

    pub fn load_from(path: &Path) -> GalleryResult<Self> {
        let txt = fs::read_to_string(path)?;
        Self::from_toml(&txt)
    }

    pub fn store_to(&self, path: &Path) -> GalleryResult<()> {
        let text = toml::to_string(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Loads the options from the config directory. Problems are logged and
    /// the defaults used.
    pub fn load_options() -> Self {
        let Some(dir) = get_config_dir() else {
            return Self::default();
        };
        if !dir.exists() && fs::create_dir_all(&dir).is_err() {
            log::error!("Can't create configuration directory {:?}", dir);
            return Self::default();
        }
        let options_file = dir.join(OPTIONS_FILE);
        if !options_file.exists() {
            return Self::default();
        }
        match Self::load_from(&options_file) {
            Ok(options) => options,
            Err(err) => {
                log::error!("Error reading options file: {}", err);
                Self::default()
            }
        }
    }

    pub fn store_options(&self) -> GalleryResult<()> {
        let dir = get_config_dir().ok_or(GalleryError::NoConfigDir)?;
        fs::create_dir_all(&dir)?;
        self.store_to(&dir.join(OPTIONS_FILE))
    }
}
