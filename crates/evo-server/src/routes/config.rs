//! Configuration routes.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use evo_config::EvolutionConfig;

use crate::error::ApiError;
use crate::server::AppState;

/// `GET /api/config` — the current effective configuration.
pub async fn current(State(state): State<AppState>) -> Json<EvolutionConfig> {
    Json(state.config_store.current())
}

/// `PUT /api/config` — deep-merge the payload over the current config,
/// validate, persist. Returns the new effective configuration.
pub async fn update(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<EvolutionConfig>, ApiError> {
    Ok(Json(state.config_store.update(payload)?))
}

/// Body naming a config file on disk.
#[derive(Debug, Deserialize)]
pub struct FileBody {
    /// File path.
    pub path: PathBuf,
}

/// `POST /api/config/load` — load a config file and make it current.
pub async fn load(
    State(state): State<AppState>,
    Json(body): Json<FileBody>,
) -> Result<Json<EvolutionConfig>, ApiError> {
    let config = state.config_store.load_file(&body.path)?;
    state.config_store.set(config.clone());
    Ok(Json(config))
}

/// Body for the save route; an absent path means the store's own file.
#[derive(Debug, Default, Deserialize)]
pub struct SaveBody {
    /// Target path override.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `POST /api/config/save` — persist the current config.
pub async fn save(
    State(state): State<AppState>,
    body: Option<Json<SaveBody>>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let path = body
        .path
        .unwrap_or_else(|| state.config_store.path().to_path_buf());
    state.config_store.save_file(&path)?;
    Ok(Json(json!({ "saved": path })))
}

/// `POST /api/config/validate` — check a candidate config without
/// applying it. Always 200; validity is in the body.
pub async fn validate(Json(payload): Json<Value>) -> Json<Value> {
    match serde_json::from_value::<EvolutionConfig>(payload)
        .map_err(|e| e.to_string())
        .and_then(|c| c.validate().map_err(|e| e.to_string()))
    {
        Ok(()) => Json(json!({ "valid": true })),
        Err(error) => Json(json!({ "valid": false, "error": error })),
    }
}
