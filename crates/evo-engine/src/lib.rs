//! # evo-engine
//!
//! Narrow interfaces to the external optimization engine, plus the
//! artifact readers the server needs:
//!
//! - [`OptimizationEngine`] / [`EngineFactory`]: the seam between the
//!   orchestration layer and the engine proper (whose algorithm is an
//!   external concern)
//! - [`checkpoint`]: persisted-snapshot discovery and loading
//! - [`logfile`]: structured engine log-file parsing
//! - [`simulated`]: a development stand-in engine

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod logfile;
pub mod simulated;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use evo_config::EvolutionConfig;
use thiserror::Error;

use crate::types::Population;

/// Error raised by an engine invocation or artifact access.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem access failed.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Checkpoint or program JSON was malformed.
    #[error("engine data error: {0}")]
    Data(#[from] serde_json::Error),
    /// The engine itself failed.
    #[error("{0}")]
    Failed(String),
}

/// Progress reported by the engine at each iteration.
#[derive(Clone, Copy, Debug)]
pub struct ProgressUpdate {
    /// Iteration just finished.
    pub iteration: u64,
    /// Best known score so far, if any candidate has been evaluated.
    pub best_score: Option<f64>,
}

/// Callback the engine invokes after each iteration.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Everything needed to construct one engine invocation.
pub struct EngineSpec {
    /// Path to the initial program artifact.
    pub initial_program: PathBuf,
    /// Path to the evaluator artifact.
    pub evaluator: PathBuf,
    /// Resolved effective configuration.
    pub config: EvolutionConfig,
    /// Directory the engine writes checkpoints and logs to.
    pub output_dir: PathBuf,
    /// Per-iteration progress callback.
    pub progress: ProgressCallback,
}

/// A long-running optimization engine bound to one run.
///
/// `run` drives the computation; the remaining methods are cheap reads
/// of in-memory engine state, safe to call while `run` is in flight.
#[async_trait]
pub trait OptimizationEngine: Send + Sync {
    /// Drive the engine for up to `iterations` iterations.
    async fn run(&self, iterations: u64) -> Result<(), EngineError>;

    /// Latest completed iteration.
    fn last_iteration(&self) -> u64;

    /// Best known combined score, looked up at call time.
    fn best_score(&self) -> Option<f64>;

    /// Snapshot of the in-memory candidate population.
    fn population(&self) -> Population;
}

/// Builds engine instances for new runs.
pub trait EngineFactory: Send + Sync {
    /// Construct an engine for the given spec.
    fn create(&self, spec: EngineSpec) -> Result<Arc<dyn OptimizationEngine>, EngineError>;
}
