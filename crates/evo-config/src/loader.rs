//! Config file loading and JSON deep merge.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::EvolutionConfig;

/// Resolve the path to the persisted UI config (`~/.evolve/ui_config.json`).
pub fn ui_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".evolve").join("ui_config.json")
}

/// Load a config file, deep-merging its values over compiled defaults.
///
/// Returns an error if the file is unreadable or contains invalid JSON;
/// a missing key simply keeps its default.
pub fn load_config(path: &Path) -> Result<EvolutionConfig> {
    debug!(?path, "loading config from file");
    let defaults = serde_json::to_value(EvolutionConfig::default())?;
    let content = std::fs::read_to_string(path)?;
    let user: Value = serde_json::from_str(&content)?;
    let merged = deep_merge(defaults, user);
    let config: EvolutionConfig = serde_json::from_value(merged)?;
    config.validate()?;
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}
