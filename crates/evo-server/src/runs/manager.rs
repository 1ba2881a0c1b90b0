//! The run registry: start, stop, pause, inspect and evict runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use evo_config::ConfigStore;
use evo_core::{EvolutionEvent, OrchestratorError, RunSnapshot, RunStatus};
use evo_engine::checkpoint;
use evo_engine::logfile::{read_run_logs, LogLine};
use evo_engine::types::{Candidate, EvolutionData};
use evo_engine::{EngineFactory, EngineSpec, OptimizationEngine, ProgressUpdate};

const LOG_TAIL_LINES: usize = 100;

/// Parameters for starting a run.
#[derive(Clone, Debug, Default)]
pub struct StartRequest {
    /// Path to the initial program; must exist.
    pub initial_program: PathBuf,
    /// Path to the evaluator; must exist.
    pub evaluator: PathBuf,
    /// Explicit config file. Absent → current UI config → defaults.
    pub config_path: Option<PathBuf>,
    /// Iteration-budget override.
    pub iterations: Option<u64>,
    /// Where the engine writes artifacts. Defaults to `evo_output`
    /// next to the initial program.
    pub output_dir: Option<PathBuf>,
}

struct RunEntry {
    engine: Arc<dyn OptimizationEngine>,
    status: RunStatus,
    total_iterations: u64,
    start_time: f64,
    error: Option<String>,
    output_dir: PathBuf,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished_at: Option<Instant>,
}

impl RunEntry {
    /// Monotonic transition guard: only a `Running` entry may move.
    fn transition(&mut self, next: RunStatus) -> bool {
        if self.status.is_running() {
            self.status = next;
            if next != RunStatus::Running {
                self.finished_at = Some(Instant::now());
            }
            true
        } else {
            false
        }
    }
}

/// Registry of runs plus the lifecycle operations of the control
/// surface. Dependency-injected: the engine factory, the config store
/// and the event bus all arrive through the constructor.
pub struct RunManager {
    runs: RwLock<HashMap<String, RunEntry>>,
    factory: Arc<dyn EngineFactory>,
    config_store: Arc<ConfigStore>,
    bus: broadcast::Sender<EvolutionEvent>,
    retention: Duration,
}

impl RunManager {
    /// Build an empty registry.
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        config_store: Arc<ConfigStore>,
        bus: broadcast::Sender<EvolutionEvent>,
        retention: Duration,
    ) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            factory,
            config_store,
            bus,
            retention,
        }
    }

    fn publish(&self, event: EvolutionEvent) {
        // A bus without receivers just means nobody is watching.
        let _ = self.bus.send(event);
    }

    /// Validate, resolve configuration, build the engine, register the
    /// run and spawn its background task. Returns the new run id
    /// immediately; progress arrives on the event bus.
    ///
    /// A failed start registers nothing.
    pub fn start(self: &Arc<Self>, request: StartRequest) -> Result<String, OrchestratorError> {
        if !request.initial_program.is_file() {
            return Err(OrchestratorError::validation(format!(
                "Initial program not found: {}",
                request.initial_program.display()
            )));
        }
        if !request.evaluator.is_file() {
            return Err(OrchestratorError::validation(format!(
                "Evaluator not found: {}",
                request.evaluator.display()
            )));
        }

        let mut config = match &request.config_path {
            Some(path) => self
                .config_store
                .load_file(path)
                .map_err(|e| OrchestratorError::validation(e.to_string()))?,
            None => self.config_store.current(),
        };
        config.fill_api_key_from_env();
        if let Some(iterations) = request.iterations {
            config.max_iterations = iterations;
        }
        config
            .validate()
            .map_err(|e| OrchestratorError::validation(e.to_string()))?;
        config.adjust_for_ui_run();

        let output_dir = request.output_dir.clone().unwrap_or_else(|| {
            request
                .initial_program
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("evo_output")
        });
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| OrchestratorError::engine(format!("cannot create output dir: {e}")))?;

        let run_id = Uuid::new_v4().to_string();
        let total_iterations = config.max_iterations;

        let progress_bus = self.bus.clone();
        let progress_run = run_id.clone();
        let progress = Arc::new(move |update: ProgressUpdate| {
            let _ = progress_bus.send(EvolutionEvent::EvolutionProgress {
                run_id: progress_run.clone(),
                iteration: update.iteration,
                best_score: update.best_score,
            });
        });

        let engine = self
            .factory
            .create(EngineSpec {
                initial_program: request.initial_program,
                evaluator: request.evaluator,
                config,
                output_dir: output_dir.clone(),
                progress,
            })
            .map_err(|e| OrchestratorError::engine(e.to_string()))?;

        let cancel = CancellationToken::new();
        let entry = RunEntry {
            engine: engine.clone(),
            status: RunStatus::Running,
            total_iterations,
            start_time: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            error: None,
            output_dir,
            cancel: cancel.clone(),
            task: None,
            finished_at: None,
        };
        // Registered before the task spawns so completion always finds
        // its entry.
        let _ = self.runs.write().insert(run_id.clone(), entry);

        let task = tokio::spawn(
            Arc::clone(self)
                .drive_run(run_id.clone(), engine, total_iterations, cancel)
                .instrument(info_span!("run_task", run_id = %run_id)),
        );
        if let Some(entry) = self.runs.write().get_mut(&run_id) {
            entry.task = Some(task);
        }

        info!(run_id = %run_id, iterations = total_iterations, "run started");
        self.publish(EvolutionEvent::EvolutionStarted {
            run_id: run_id.clone(),
        });
        Ok(run_id)
    }

    async fn drive_run(
        self: Arc<Self>,
        run_id: String,
        engine: Arc<dyn OptimizationEngine>,
        iterations: u64,
        cancel: CancellationToken,
    ) {
        tokio::select! {
            () = cancel.cancelled() => {
                // Status was already set by the stop operation.
                info!("run cancelled");
            }
            result = engine.run(iterations) => match result {
                Ok(()) => {
                    let transitioned = self
                        .runs
                        .write()
                        .get_mut(&run_id)
                        .is_some_and(|e| e.transition(RunStatus::Completed));
                    if transitioned {
                        info!("run completed");
                        self.publish(EvolutionEvent::EvolutionComplete {
                            run_id: run_id.clone(),
                        });
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    let transitioned = {
                        let mut runs = self.runs.write();
                        runs.get_mut(&run_id).is_some_and(|entry| {
                            let moved = entry.transition(RunStatus::Error);
                            if moved {
                                entry.error = Some(message.clone());
                            }
                            moved
                        })
                    };
                    if transitioned {
                        error!(error = %message, "run failed");
                        self.publish(EvolutionEvent::EvolutionError {
                            run_id: run_id.clone(),
                            error: message,
                        });
                    }
                }
            },
        }
    }

    /// Stop a running run: cancel its task, mark it `Stopped`, notify
    /// subscribers. NotFound for unknown ids, InvalidState when the run
    /// is not `Running`.
    pub fn stop(&self, run_id: &str) -> Result<(), OrchestratorError> {
        {
            let mut runs = self.runs.write();
            let entry = runs
                .get_mut(run_id)
                .ok_or_else(|| OrchestratorError::not_found(format!("Run {run_id} not found")))?;
            if !entry.transition(RunStatus::Stopped) {
                return Err(OrchestratorError::invalid_state(format!(
                    "Run {run_id} is not running (status: {})",
                    entry.status
                )));
            }
            entry.cancel.cancel();
        }
        info!(run_id = %run_id, "run stopped");
        self.publish(EvolutionEvent::RunStopped {
            run_id: run_id.to_owned(),
        });
        Ok(())
    }

    /// Pause a running run. Status-only: the engine task keeps running
    /// and there is no resume; the marker exists for the UI.
    pub fn pause(&self, run_id: &str) -> Result<(), OrchestratorError> {
        {
            let mut runs = self.runs.write();
            let entry = runs
                .get_mut(run_id)
                .ok_or_else(|| OrchestratorError::not_found(format!("Run {run_id} not found")))?;
            if !entry.transition(RunStatus::Paused) {
                return Err(OrchestratorError::invalid_state(format!(
                    "Run {run_id} is not running (status: {})",
                    entry.status
                )));
            }
        }
        info!(run_id = %run_id, "run paused");
        self.publish(EvolutionEvent::RunPaused {
            run_id: run_id.to_owned(),
        });
        Ok(())
    }

    /// Point-in-time snapshot. Iteration and best score are read from
    /// the engine at call time, not cached.
    pub fn status(&self, run_id: &str) -> Result<RunSnapshot, OrchestratorError> {
        let runs = self.runs.read();
        let entry = runs
            .get(run_id)
            .ok_or_else(|| OrchestratorError::not_found(format!("Run {run_id} not found")))?;
        Ok(RunSnapshot {
            status: entry.status,
            iteration: entry.engine.last_iteration(),
            total_iterations: entry.total_iterations,
            best_score: entry.engine.best_score(),
            start_time: entry.start_time,
            error: entry.error.clone(),
        })
    }

    /// Evolution graph for a run: latest checkpoint when one exists,
    /// live population synthesis otherwise. Never fails once the id
    /// resolves.
    pub fn data(&self, run_id: &str) -> Result<EvolutionData, OrchestratorError> {
        let (engine, output_dir) = {
            let runs = self.runs.read();
            let entry = runs
                .get(run_id)
                .ok_or_else(|| OrchestratorError::not_found(format!("Run {run_id} not found")))?;
            (entry.engine.clone(), entry.output_dir.clone())
        };
        if let Some(data) = checkpoint::load_latest(&output_dir) {
            return Ok(data);
        }
        Ok(engine.population().to_evolution_data())
    }

    /// Tail of the newest engine log file for a run.
    pub fn logs(&self, run_id: &str) -> Result<Vec<LogLine>, OrchestratorError> {
        let output_dir = {
            let runs = self.runs.read();
            runs.get(run_id)
                .ok_or_else(|| OrchestratorError::not_found(format!("Run {run_id} not found")))?
                .output_dir
                .clone()
        };
        read_run_logs(&output_dir, LOG_TAIL_LINES)
            .map_err(|e| OrchestratorError::engine(e.to_string()))
    }

    /// Look up one program node in a run's evolution data.
    pub fn program(
        &self,
        run_id: &str,
        program_id: &str,
    ) -> Result<Candidate, OrchestratorError> {
        let data = self.data(run_id)?;
        data.nodes
            .into_iter()
            .find(|c| c.id == program_id)
            .ok_or_else(|| {
                OrchestratorError::not_found(format!("Program {program_id} not found"))
            })
    }

    /// Runs currently in the `Running` state.
    pub fn active_count(&self) -> usize {
        self.runs
            .read()
            .values()
            .filter(|e| e.status.is_running())
            .count()
    }

    /// Total registered runs.
    pub fn run_count(&self) -> usize {
        self.runs.read().len()
    }

    /// Drop terminal runs whose finish predates the retention window.
    /// Paused runs are never evicted.
    pub fn evict_finished(&self) -> usize {
        let cutoff = Instant::now();
        let mut evicted = 0;
        self.runs.write().retain(|run_id, entry| {
            let expired = entry.status.is_terminal()
                && entry
                    .finished_at
                    .is_some_and(|at| cutoff.duration_since(at) >= self.retention);
            if expired {
                info!(run_id = %run_id, status = %entry.status, "evicting finished run");
                evicted += 1;
            }
            !expired
        });
        evicted
    }

    /// Cancel every live run task. Used by graceful shutdown.
    pub fn shutdown(&self) {
        let runs = self.runs.read();
        for (run_id, entry) in runs.iter() {
            if entry.status.is_running() {
                info!(run_id = %run_id, "cancelling run for shutdown");
                entry.cancel.cancel();
            }
        }
    }
}
