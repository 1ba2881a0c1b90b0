//! Run lifecycle status and status snapshots.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an evolution run.
///
/// Transitions are monotonic: `Running` may move to any other state, and
/// nothing ever moves back to `Running`. `Stopped`, `Completed` and `Error`
/// are terminal. `Paused` is terminal in practice — there is no resume
/// operation on the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The background task is driving the engine.
    Running,
    /// Paused by request. Status-only: the engine is not suspended.
    Paused,
    /// Stopped by request; cancellation was signalled to the task.
    Stopped,
    /// The engine finished all iterations.
    Completed,
    /// The engine failed; see the run's error message.
    Error,
}

impl RunStatus {
    /// Whether this state ends the run for retention purposes.
    ///
    /// `Paused` is excluded: a resume operation could in principle revive
    /// it, so paused runs are never evicted.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Error)
    }

    /// Whether state-mutating operations (stop/pause) are permitted.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Point-in-time view of a run, returned by the status operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Current lifecycle state.
    pub status: RunStatus,
    /// Latest iteration reported by the engine.
    pub iteration: u64,
    /// Configured iteration target.
    pub total_iterations: u64,
    /// Best score looked up from the engine at snapshot time (not cached).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    /// Epoch seconds when the run was created.
    pub start_time: f64,
    /// Error message, set only when status is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
