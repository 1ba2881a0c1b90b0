//! Run lifecycle routes.

use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use evo_core::RunSnapshot;
use evo_engine::checkpoint;
use evo_engine::types::{Candidate, EvolutionData};

use crate::error::ApiError;
use crate::runs::StartRequest;
use crate::server::AppState;

/// Body of `POST /api/evolution/start`.
#[derive(Debug, Deserialize)]
pub struct StartBody {
    /// Path to the initial program.
    pub initial_program: PathBuf,
    /// Path to the evaluator.
    pub evaluator: PathBuf,
    /// Explicit config file; absent means UI config then defaults.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Iteration-budget override.
    #[serde(default)]
    pub iterations: Option<u64>,
    /// Engine artifact directory override.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Response of the start route.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// Minted run identifier.
    pub run_id: String,
    /// Always `"started"`.
    pub status: &'static str,
}

/// `POST /api/evolution/start`
pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<StartBody>,
) -> Result<Json<StartResponse>, ApiError> {
    let run_id = state.runs.start(StartRequest {
        initial_program: body.initial_program,
        evaluator: body.evaluator,
        config_path: body.config_path,
        iterations: body.iterations,
        output_dir: body.output_dir,
    })?;
    Ok(Json(StartResponse {
        run_id,
        status: "started",
    }))
}

/// `POST /api/evolution/{run_id}/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.runs.stop(&run_id)?;
    Ok(Json(json!({ "run_id": run_id, "status": "stopped" })))
}

/// `POST /api/evolution/{run_id}/pause`
pub async fn pause(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.runs.pause(&run_id)?;
    Ok(Json(json!({ "run_id": run_id, "status": "paused" })))
}

/// `GET /api/evolution/{run_id}/status`
pub async fn status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>, ApiError> {
    Ok(Json(state.runs.status(&run_id)?))
}

/// `GET /api/evolution/{run_id}/data`
pub async fn data(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<EvolutionData>, ApiError> {
    Ok(Json(state.runs.data(&run_id)?))
}

/// `GET /api/evolution/{run_id}/logs`
pub async fn logs(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let lines = state.runs.logs(&run_id)?;
    Ok(Json(json!({ "run_id": run_id, "logs": lines })))
}

/// Query string of the program-detail route.
#[derive(Debug, Deserialize)]
pub struct ProgramQuery {
    /// Resolve through a registered run.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Resolve through an on-disk checkpoint tree.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `GET /api/evolution/program/{program_id}?run_id=|path=`
pub async fn program(
    State(state): State<AppState>,
    Path(program_id): Path<String>,
    Query(query): Query<ProgramQuery>,
) -> Result<Json<Candidate>, ApiError> {
    if let Some(run_id) = &query.run_id {
        return Ok(Json(state.runs.program(run_id, &program_id)?));
    }
    if let Some(path) = &query.path {
        let data = checkpoint::load_latest(path)
            .ok_or_else(|| ApiError::not_found(format!("No checkpoint under {}", path.display())))?;
        return data
            .nodes
            .into_iter()
            .find(|c| c.id == program_id)
            .map(Json)
            .ok_or_else(|| ApiError::not_found(format!("Program {program_id} not found")));
    }
    Err(ApiError::bad_request("run_id or path query is required"))
}

/// Query string of the raw-data route.
#[derive(Debug, Deserialize)]
pub struct DataQuery {
    /// Directory to scan for checkpoints.
    pub path: PathBuf,
}

/// `GET /api/data?path=` — checkpoint data from an arbitrary directory.
/// Missing or unreadable checkpoints yield the empty structure.
pub async fn data_for_path(Query(query): Query<DataQuery>) -> Json<EvolutionData> {
    Json(checkpoint::load_latest(&query.path).unwrap_or_default())
}
