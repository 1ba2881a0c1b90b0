//! Wire-format events pushed to WebSocket clients.
//!
//! One closed enum, one variant per event kind, each carrying exactly its
//! required fields. Serialized with a `type` discriminator plus an RFC 3339
//! envelope timestamp added at send time.

use serde::{Deserialize, Serialize};

/// A server-pushed event.
///
/// Fire-and-forget: no acknowledgment, no persistence, no replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvolutionEvent {
    /// A new run was started. Delivered to every connection, since no one
    /// can be subscribed to the run yet.
    EvolutionStarted {
        /// Identifier of the new run.
        run_id: String,
    },
    /// Progress update re-emitted from the engine's progress callback.
    EvolutionProgress {
        /// Run the progress belongs to.
        run_id: String,
        /// Current engine iteration.
        iteration: u64,
        /// Best known score, if the engine has one yet.
        #[serde(skip_serializing_if = "Option::is_none")]
        best_score: Option<f64>,
    },
    /// The run's background task finished successfully.
    EvolutionComplete {
        /// Finished run.
        run_id: String,
    },
    /// The run's background task failed.
    EvolutionError {
        /// Failed run.
        run_id: String,
        /// Captured engine error message.
        error: String,
    },
    /// The run was stopped by an explicit stop request.
    #[serde(rename = "run-stopped")]
    RunStopped {
        /// Stopped run.
        run_id: String,
    },
    /// The run was paused by an explicit pause request.
    #[serde(rename = "run-paused")]
    RunPaused {
        /// Paused run.
        run_id: String,
    },
    /// An intercepted log record.
    Log {
        /// Lowercase level name (`trace`..`error`).
        level: String,
        /// Formatted log message.
        message: String,
        /// Log source (module/target).
        source: String,
        /// Record creation time as epoch seconds.
        timestamp: f64,
        /// Run the record is attributed to, if any. Unbound records are
        /// broadcast to all connections.
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
}

/// Delivery scope of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventScope<'a> {
    /// Every admitted connection.
    AllConnections,
    /// Only connections subscribed to this run.
    Run(&'a str),
}

impl EvolutionEvent {
    /// Wire discriminator string for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EvolutionStarted { .. } => "evolution_started",
            Self::EvolutionProgress { .. } => "evolution_progress",
            Self::EvolutionComplete { .. } => "evolution_complete",
            Self::EvolutionError { .. } => "evolution_error",
            Self::RunStopped { .. } => "run-stopped",
            Self::RunPaused { .. } => "run-paused",
            Self::Log { .. } => "log",
        }
    }

    /// Where this event should be delivered.
    ///
    /// `evolution_started` and run-unbound logs go to all connections;
    /// everything else is scoped to its run's subscriber set.
    pub fn scope(&self) -> EventScope<'_> {
        match self {
            Self::EvolutionStarted { .. } | Self::Log { run_id: None, .. } => {
                EventScope::AllConnections
            }
            Self::EvolutionProgress { run_id, .. }
            | Self::EvolutionComplete { run_id }
            | Self::EvolutionError { run_id, .. }
            | Self::RunStopped { run_id }
            | Self::RunPaused { run_id }
            | Self::Log {
                run_id: Some(run_id),
                ..
            } => EventScope::Run(run_id),
        }
    }

    /// Serialize for transmission, adding the envelope timestamp.
    ///
    /// Log records already carry their creation time, so they are sent
    /// as-is rather than double-stamped.
    pub fn to_wire_json(&self) -> Result<String, serde_json::Error> {
        if matches!(self, Self::Log { .. }) {
            return serde_json::to_string(self);
        }
        serde_json::to_string(&WireEnvelope {
            event: self,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Outbound envelope: the tagged event plus a send-time timestamp.
#[derive(Serialize)]
struct WireEnvelope<'a> {
    #[serde(flatten)]
    event: &'a EvolutionEvent,
    timestamp: String,
}
