//! # evo-config
//!
//! Evolution-configuration management with layered sources.
//!
//! Effective config for a run is resolved in priority order:
//! 1. **Explicit file** — a `config.json` path named in the start request
//! 2. **UI config** — the last configuration saved through the config
//!    routes (`~/.evolve/ui_config.json`)
//! 3. **Compiled defaults** — [`EvolutionConfig::default()`]
//!
//! Environment-sourced credentials (`OPENAI_API_KEY`) fill gaps only when
//! the resolved config has none.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod store;
pub mod types;

pub use errors::{ConfigError, Result};
pub use loader::{deep_merge, load_config, ui_config_path};
pub use store::ConfigStore;
pub use types::{EvolutionConfig, LlmConfig};
