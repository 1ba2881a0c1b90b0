//! A development stand-in engine.
//!
//! `SimulatedEngine` runs a deterministic pseudo-evolution: each
//! iteration mutates a parent from the current population, scores the
//! child with a hash-derived value, and keeps the artifacts the real
//! engine would keep (in-memory population, archive, interval
//! checkpoints under the run's output directory).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::checkpoint::save_checkpoint;
use crate::types::{Candidate, Population};
use crate::{EngineError, EngineFactory, EngineSpec, OptimizationEngine, ProgressCallback};

const ARCHIVE_SIZE: usize = 10;
const ITERATION_DELAY: Duration = Duration::from_millis(50);

#[derive(Default)]
struct EngineState {
    population: Population,
    last_iteration: u64,
    best_score: Option<f64>,
}

/// Deterministic stand-in for a real optimization engine.
pub struct SimulatedEngine {
    state: Mutex<EngineState>,
    checkpoint_interval: u64,
    output_dir: PathBuf,
    progress: ProgressCallback,
    seed_code: String,
}

impl SimulatedEngine {
    fn new(spec: &EngineSpec) -> Result<Self, EngineError> {
        let seed_code = std::fs::read_to_string(&spec.initial_program)?;
        Ok(Self {
            state: Mutex::new(EngineState::default()),
            checkpoint_interval: spec.config.checkpoint_interval,
            output_dir: spec.output_dir.clone(),
            progress: spec.progress.clone(),
            seed_code,
        })
    }

    fn seed_population(&self) {
        let mut state = self.state.lock();
        if !state.population.candidates.is_empty() {
            return;
        }
        let seed = Candidate {
            id: Uuid::new_v4().to_string(),
            code: self.seed_code.clone(),
            metrics: BTreeMap::from([("combined_score".to_string(), 0.0)]),
            generation: 0,
            parent_id: None,
            island: 0,
            iteration: 0,
            method: "seed".to_string(),
        };
        state.population.archive.push(seed.id.clone());
        state.population.candidates.push(seed);
    }

    fn step(&self, iteration: u64) {
        let mut state = self.state.lock();

        // Deterministic parent choice and score, derived from the
        // iteration counter so reruns reproduce the same trajectory.
        let noise = xorshift(iteration + 1);
        let parent_idx = (noise as usize) % state.population.candidates.len();
        let parent = &state.population.candidates[parent_idx];

        let score = (iteration as f64 / (iteration as f64 + 20.0))
            + (noise % 1000) as f64 / 10_000.0;
        let child = Candidate {
            id: Uuid::new_v4().to_string(),
            code: format!("{}\n# rev {iteration}", parent.code),
            metrics: BTreeMap::from([("combined_score".to_string(), score)]),
            generation: parent.generation + 1,
            parent_id: Some(parent.id.clone()),
            island: (noise % 4) as u32,
            iteration,
            method: if noise % 3 == 0 { "crossover" } else { "mutation" }.to_string(),
        };
        let child_id = child.id.clone();
        state.population.candidates.push(child);

        if state.best_score.map_or(true, |b| score > b) {
            state.best_score = Some(score);
            debug!(iteration, score, "new best candidate");
        }

        // Keep the archive as the top-scoring candidates.
        state.population.archive.push(child_id);
        let mut scored: Vec<(String, f64)> = state
            .population
            .archive
            .iter()
            .map(|id| {
                let s = state
                    .population
                    .candidates
                    .iter()
                    .find(|c| &c.id == id)
                    .and_then(Candidate::combined_score)
                    .unwrap_or(f64::NEG_INFINITY);
                (id.clone(), s)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(ARCHIVE_SIZE);
        state.population.archive = scored.into_iter().map(|(id, _)| id).collect();

        state.last_iteration = iteration;
    }
}

#[async_trait]
impl OptimizationEngine for SimulatedEngine {
    async fn run(&self, iterations: u64) -> Result<(), EngineError> {
        self.seed_population();
        info!(iterations, "simulated engine starting");

        for iteration in 1..=iterations {
            tokio::time::sleep(ITERATION_DELAY).await;
            self.step(iteration);

            let update = {
                let state = self.state.lock();
                crate::ProgressUpdate {
                    iteration,
                    best_score: state.best_score,
                }
            };
            (self.progress)(update);

            if self.checkpoint_interval > 0 && iteration % self.checkpoint_interval == 0 {
                let population = self.population();
                save_checkpoint(&self.output_dir, iteration, &population)?;
                info!(iteration, "checkpoint written");
            }
        }

        info!(
            best_score = ?self.best_score(),
            "simulated engine finished"
        );
        Ok(())
    }

    fn last_iteration(&self) -> u64 {
        self.state.lock().last_iteration
    }

    fn best_score(&self) -> Option<f64> {
        self.state.lock().best_score
    }

    fn population(&self) -> Population {
        self.state.lock().population.clone()
    }
}

/// Factory producing [`SimulatedEngine`] instances.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedEngineFactory;

impl EngineFactory for SimulatedEngineFactory {
    fn create(&self, spec: EngineSpec) -> Result<Arc<dyn OptimizationEngine>, EngineError> {
        Ok(Arc::new(SimulatedEngine::new(&spec)?))
    }
}

fn xorshift(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_config::EvolutionConfig;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn spec(dir: &std::path::Path, checkpoint_interval: u64) -> (EngineSpec, Arc<AtomicU64>) {
        let initial = dir.join("initial.py");
        std::fs::write(&initial, "def f(): pass\n").unwrap();
        let evaluator = dir.join("eval.py");
        std::fs::write(&evaluator, "def evaluate(p): return {}\n").unwrap();

        let calls = Arc::new(AtomicU64::new(0));
        let calls_in_cb = calls.clone();
        let spec = EngineSpec {
            initial_program: initial,
            evaluator,
            config: EvolutionConfig {
                checkpoint_interval,
                ..EvolutionConfig::default()
            },
            output_dir: dir.to_path_buf(),
            progress: Arc::new(move |_| {
                let _ = calls_in_cb.fetch_add(1, Ordering::SeqCst);
            }),
        };
        (spec, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_requested_iterations_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (spec, calls) = spec(dir.path(), 0);
        let engine = SimulatedEngine::new(&spec).unwrap();

        engine.run(5).await.unwrap();

        assert_eq!(engine.last_iteration(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(engine.best_score().is_some());
        // Seed plus one child per iteration.
        assert_eq!(engine.population().candidates.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_interval_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let (spec, _) = spec(dir.path(), 2);
        let engine = SimulatedEngine::new(&spec).unwrap();

        engine.run(4).await.unwrap();

        assert!(dir.path().join("checkpoints/checkpoint_2").is_dir());
        assert!(dir.path().join("checkpoints/checkpoint_4").is_dir());
    }

    #[tokio::test(start_paused = true)]
    async fn archive_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let (spec, _) = spec(dir.path(), 0);
        let engine = SimulatedEngine::new(&spec).unwrap();

        engine.run(30).await.unwrap();
        assert!(engine.population().archive.len() <= ARCHIVE_SIZE);
    }

    #[test]
    fn missing_initial_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = EngineSpec {
            initial_program: dir.path().join("missing.py"),
            evaluator: dir.path().join("missing_eval.py"),
            config: EvolutionConfig::default(),
            output_dir: dir.path().to_path_buf(),
            progress: Arc::new(|_| {}),
        };
        assert!(matches!(SimulatedEngine::new(&spec), Err(EngineError::Io(_))));
    }
}
