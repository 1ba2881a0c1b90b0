//! In-memory config store with JSON persistence.
//!
//! Holds the "current" UI configuration used as the fallback when a start
//! request names no explicit config file. Updates are deep-merged,
//! validated, then persisted; a failed persist keeps the in-memory update.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{error, info};

use crate::errors::Result;
use crate::loader::{deep_merge, load_config};
use crate::types::EvolutionConfig;

/// Dependency-injected store for the current UI configuration.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Option<EvolutionConfig>>,
}

impl ConfigStore {
    /// Create a store persisting to `path`. No file access happens here.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current: RwLock::new(None),
        }
    }

    /// Path the store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted config into memory, if the file exists.
    ///
    /// A missing or unreadable file leaves the store empty; the error is
    /// logged, not returned, so startup never fails on a bad UI config.
    pub fn load_persistent(&self) {
        if !self.path.exists() {
            return;
        }
        match load_config(&self.path) {
            Ok(config) => {
                info!(path = %self.path.display(), "loaded persistent configuration");
                *self.current.write() = Some(config);
            }
            Err(e) => {
                error!(error = %e, path = %self.path.display(), "failed to load persistent config");
            }
        }
    }

    /// Current config, falling back to compiled defaults.
    pub fn current(&self) -> EvolutionConfig {
        self.current.read().clone().unwrap_or_default()
    }

    /// Current config if one was explicitly set or loaded.
    pub fn current_if_set(&self) -> Option<EvolutionConfig> {
        self.current.read().clone()
    }

    /// Replace the current config without persisting.
    pub fn set(&self, config: EvolutionConfig) {
        *self.current.write() = Some(config);
    }

    /// Deep-merge `update` over the current config, validate, persist.
    ///
    /// Returns the new effective config. Persistence failures are logged
    /// and swallowed — the in-memory update still takes effect.
    pub fn update(&self, update: Value) -> Result<EvolutionConfig> {
        let base = serde_json::to_value(self.current())?;
        let merged = deep_merge(base, update);
        let config: EvolutionConfig = serde_json::from_value(merged)?;
        config.validate()?;

        *self.current.write() = Some(config.clone());

        if let Err(e) = self.persist(&config) {
            error!(error = %e, "failed to save config to persistent storage");
        } else {
            info!(path = %self.path.display(), "saved config");
        }
        Ok(config)
    }

    /// Load a config file and make it current (not persisted to the UI path).
    pub fn load_file(&self, path: &Path) -> Result<EvolutionConfig> {
        let config = load_config(path)?;
        *self.current.write() = Some(config.clone());
        Ok(config)
    }

    /// Write the current config to an arbitrary path.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let config = self.current();
        write_json(path, &config)
    }

    fn persist(&self, config: &EvolutionConfig) -> Result<()> {
        write_json(&self.path, config)
    }
}

fn write_json(path: &Path, config: &EvolutionConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
