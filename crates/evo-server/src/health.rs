//! Health endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` while the server answers.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
    /// Admitted WebSocket connections.
    pub connections: usize,
    /// Runs in the `running` state.
    pub active_runs: usize,
    /// All registered runs, terminal included.
    pub total_runs: usize,
}

/// `GET /health` (also served at `/`).
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        connections: state.broadcast.connection_count(),
        active_runs: state.runs.active_count(),
        total_runs: state.runs.run_count(),
    })
}
