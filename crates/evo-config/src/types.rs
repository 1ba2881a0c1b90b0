//! Evolution configuration types with compiled defaults.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Configuration for one evolution run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Iteration budget for the engine.
    pub max_iterations: u64,
    /// Iterations between checkpoint writes.
    pub checkpoint_interval: u64,
    /// Candidate population size hint passed to the engine.
    pub population_size: u64,
    /// Log level requested of the engine (`debug`, `info`, ...).
    pub log_level: String,
    /// LLM settings forwarded to the engine.
    pub llm: LlmConfig,
}

/// LLM settings for the engine's generation step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier.
    pub model: String,
    /// API key; filled from `OPENAI_API_KEY` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override endpoint, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            checkpoint_interval: 100,
            population_size: 100,
            log_level: "info".into(),
            llm: LlmConfig::default(),
        }
    }
}

impl EvolutionConfig {
    /// Validate value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_iterations must be >= 1".into(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "checkpoint_interval must be >= 1".into(),
            ));
        }
        if self.population_size == 0 {
            return Err(ConfigError::InvalidValue(
                "population_size must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Fill the API key from the environment when the config has none.
    pub fn fill_api_key_from_env(&mut self) {
        if self.llm.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                if !key.is_empty() {
                    tracing::info!("using OPENAI_API_KEY from environment");
                    self.llm.api_key = Some(key);
                }
            }
        }
    }

    /// Clamp the checkpoint interval for UI-driven runs.
    ///
    /// UI runs checkpoint every 10 iterations at most, so the visualizer
    /// has data early in the run.
    pub fn adjust_for_ui_run(&mut self) {
        if self.checkpoint_interval > 10 {
            tracing::info!(
                from = self.checkpoint_interval,
                to = 10u64,
                "adjusting checkpoint_interval for UI visualization"
            );
            self.checkpoint_interval = 10;
        }
    }
}
