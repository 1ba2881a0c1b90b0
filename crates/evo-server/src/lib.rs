//! # evo-server
//!
//! The evolution server: an Axum HTTP + WebSocket front end over a run
//! registry and a fan-out event bus.
//!
//! Layout:
//!
//! - [`ws`]: connection registry, broadcast dispatcher, per-socket
//!   sessions and the bus-to-socket event bridge
//! - [`runs`]: the run registry and lifecycle operations
//! - [`routes`]: the REST control surface
//! - [`logging`]: the tracing layer that mirrors engine logs onto the bus
//! - [`server`]: router assembly and serving
//! - [`shutdown`]: graceful-shutdown coordination

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod routes;
pub mod runs;
pub mod server;
pub mod shutdown;
pub mod ws;

pub use config::ServerConfig;
pub use server::{build_router, AppState};
