//! Error taxonomy shared by the control surface and the run registry.

use thiserror::Error;

/// Machine-readable code: unknown run/program/file.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Machine-readable code: operation not valid for the current run status.
pub const INVALID_STATE: &str = "INVALID_STATE";
/// Machine-readable code: malformed configuration or missing artifact.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Machine-readable code: engine invocation failure.
pub const ENGINE_ERROR: &str = "ENGINE_ERROR";

/// Failure raised by run-orchestration operations.
///
/// Transport failures are deliberately absent: a failed send to a client is
/// handled inside the dispatcher (deregistration) and never surfaced here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Unknown run, program or file.
    #[error("{message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// Operation not valid for the run's current status.
    #[error("{message}")]
    InvalidState {
        /// Human-readable message.
        message: String,
    },

    /// Malformed configuration or missing required artifact.
    #[error("{message}")]
    Validation {
        /// Human-readable message.
        message: String,
    },

    /// The engine invocation failed.
    #[error("{message}")]
    Engine {
        /// Human-readable message.
        message: String,
    },
}

impl OrchestratorError {
    /// Build a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Build an `InvalidState` error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Build a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build an `Engine` error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Machine-readable code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => NOT_FOUND,
            Self::InvalidState { .. } => INVALID_STATE,
            Self::Validation { .. } => VALIDATION_ERROR,
            Self::Engine { .. } => ENGINE_ERROR,
        }
    }
}
