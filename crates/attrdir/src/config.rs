//! # Configuration
//!
//! Attribute storage settings are managed by [`confique`], which handles layered loading
//! from TOML files, environment variables, and compiled defaults.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `ATTRDIR_MAX_COMPACT`, `ATTRDIR_MIN_DENSE`, `ATTRDIR_TRACK_ORDER`.
//! 2. **Container Config**: `<container>/attrdir.toml`, overrides the global file.
//! 3. **Global Config**: OS-appropriate config directory (via `directories` crate).
//! 4. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `max_compact` | `8` | Largest attribute count kept in compact storage |
//! | `min_dense` | `6` | Dense storage demotes once the count drops below this |
//! | `track_order` | `true` | Record and index creation order for new objects |
//!
//! The settings apply to objects created afterwards; every object persists the
//! thresholds it was created with.

use crate::error::Result;
use crate::store::{PhaseChange, DEFAULT_MAX_COMPACT, DEFAULT_MIN_DENSE};
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "attrdir.toml";

/// Configuration for attrdir, stored in `attrdir.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttrConfig {
    /// Largest number of attributes an object keeps in compact storage.
    #[config(env = "ATTRDIR_MAX_COMPACT", default = 8)]
    pub max_compact: u16,

    /// Dense storage switches back to compact below this many attributes.
    #[config(env = "ATTRDIR_MIN_DENSE", default = 6)]
    pub min_dense: u16,

    /// Whether new objects track attribute creation order.
    #[config(env = "ATTRDIR_TRACK_ORDER", default = true)]
    pub track_order: bool,
}

impl Default for AttrConfig {
    fn default() -> Self {
        Self {
            max_compact: DEFAULT_MAX_COMPACT,
            min_dense: DEFAULT_MIN_DENSE,
            track_order: true,
        }
    }
}

impl AttrConfig {
    /// Loads the layered configuration for a container rooted at `container_root`.
    pub fn load(container_root: Option<&Path>) -> Result<Self> {
        let mut files = Vec::new();
        if let Some(root) = container_root {
            files.push(root.join(CONFIG_FILE));
        }
        if let Some(global) = global_config_path() {
            files.push(global);
        }
        Self::load_from(&files, true)
    }

    /// Loads from explicit files, highest priority first. Missing files are skipped.
    pub fn load_from(files: &[PathBuf], with_env: bool) -> Result<Self> {
        let mut builder = AttrConfig::builder();
        if with_env {
            builder = builder.env();
        }
        for file in files {
            builder = builder.file(file);
        }
        let config = builder.load()?;
        config.phase()?;
        Ok(config)
    }

    /// Validated phase-change thresholds.
    pub fn phase(&self) -> Result<PhaseChange> {
        PhaseChange::new(self.max_compact, self.min_dense)
    }
}

/// Path of the global `attrdir.toml`, if the platform has a config directory.
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "attrdir").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}
