//! REST control surface.

pub mod config;
pub mod evolution;
pub mod projects;

use axum::routing::{get, post};
use axum::Router;

use crate::server::AppState;

/// Assemble the `/api` route tree.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/evolution/start", post(evolution::start))
        .route("/evolution/{run_id}/stop", post(evolution::stop))
        .route("/evolution/{run_id}/pause", post(evolution::pause))
        .route("/evolution/{run_id}/status", get(evolution::status))
        .route("/evolution/{run_id}/data", get(evolution::data))
        .route("/evolution/{run_id}/logs", get(evolution::logs))
        .route("/evolution/program/{program_id}", get(evolution::program))
        .route("/data", get(evolution::data_for_path))
        .route("/config", get(config::current).put(config::update))
        .route("/config/load", post(config::load))
        .route("/config/save", post(config::save))
        .route("/config/validate", post(config::validate))
        .route("/projects", get(projects::list))
        .route("/projects/{name}", get(projects::detail))
}
