//! # evo-core
//!
//! Shared domain types for the evolution server:
//!
//! - [`events::EvolutionEvent`]: the closed wire-format event enum pushed to
//!   WebSocket clients
//! - [`run::RunStatus`] / [`run::RunSnapshot`]: run lifecycle state
//! - [`errors::OrchestratorError`]: the error taxonomy shared by the control
//!   surface and the run registry

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod run;

pub use errors::OrchestratorError;
pub use events::{EventScope, EvolutionEvent};
pub use run::{RunSnapshot, RunStatus};
