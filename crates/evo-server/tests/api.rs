//! Router-level tests for the control surface.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use evo_config::ConfigStore;
use evo_engine::simulated::SimulatedEngineFactory;
use evo_server::runs::RunManager;
use evo_server::server::{build_router, AppState};
use evo_server::shutdown::ShutdownCoordinator;
use evo_server::ws::BroadcastManager;
use evo_server::ServerConfig;

struct TestApp {
    router: Router,
    dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let (bus, _bus_rx) = broadcast::channel(64);
    let config_store = Arc::new(ConfigStore::new(dir.path().join("ui_config.json")));
    let runs = Arc::new(RunManager::new(
        Arc::new(SimulatedEngineFactory),
        config_store.clone(),
        bus,
        Duration::from_secs(1800),
    ));
    let state = AppState::new(
        runs,
        Arc::new(BroadcastManager::new()),
        config_store,
        ServerConfig::default(),
        ShutdownCoordinator::new(),
    );
    TestApp {
        router: build_router(state),
        dir,
    }
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn post(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn write_artifacts(dir: &std::path::Path) -> (String, String) {
    let initial = dir.join("initial_program.py");
    std::fs::write(&initial, "def f(): pass\n").unwrap();
    let evaluator = dir.join("evaluator.py");
    std::fs::write(&evaluator, "def evaluate(p): return {}\n").unwrap();
    (
        initial.to_string_lossy().into_owned(),
        evaluator.to_string_lossy().into_owned(),
    )
}

#[tokio::test]
async fn health_reports_empty_server() {
    let app = test_app();
    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
    assert_eq!(body["active_runs"], 0);
}

#[tokio::test]
async fn root_serves_health_too() {
    let app = test_app();
    let response = app.router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn start_then_status_roundtrip() {
    let app = test_app();
    let (initial, evaluator) = write_artifacts(app.dir.path());

    let response = app
        .router
        .clone()
        .oneshot(post(
            "/api/evolution/start",
            json!({ "initial_program": initial, "evaluator": evaluator, "iterations": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "started");
    let run_id = body["run_id"].as_str().unwrap().to_owned();

    let response = app
        .router
        .oneshot(get(&format!("/api/evolution/{run_id}/status")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["status"], "running");
    assert_eq!(status["total_iterations"], 5);
}

#[tokio::test]
async fn start_with_missing_artifact_is_400() {
    let app = test_app();
    let response = app
        .router
        .oneshot(post(
            "/api/evolution/start",
            json!({ "initial_program": "/no/such/file.py", "evaluator": "/no/such/eval.py" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn stop_unknown_run_is_404() {
    let app = test_app();
    let response = app
        .router
        .oneshot(post("/api/evolution/ghost/stop", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .contains("not found"));
}

#[tokio::test]
async fn stop_then_stop_again_is_400() {
    let app = test_app();
    let (initial, evaluator) = write_artifacts(app.dir.path());

    let response = app
        .router
        .clone()
        .oneshot(post(
            "/api/evolution/start",
            json!({ "initial_program": initial, "evaluator": evaluator }),
        ))
        .await
        .unwrap();
    let run_id = body_json(response).await["run_id"]
        .as_str()
        .unwrap()
        .to_owned();

    let stop_uri = format!("/api/evolution/{run_id}/stop");
    let first = app
        .router
        .clone()
        .oneshot(post(&stop_uri, json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.router.oneshot(post(&stop_uri, json!({}))).await.unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pause_marks_run_paused() {
    let app = test_app();
    let (initial, evaluator) = write_artifacts(app.dir.path());

    let response = app
        .router
        .clone()
        .oneshot(post(
            "/api/evolution/start",
            json!({ "initial_program": initial, "evaluator": evaluator }),
        ))
        .await
        .unwrap();
    let run_id = body_json(response).await["run_id"]
        .as_str()
        .unwrap()
        .to_owned();

    let response = app
        .router
        .clone()
        .oneshot(post(&format!("/api/evolution/{run_id}/pause"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(
        app.router
            .oneshot(get(&format!("/api/evolution/{run_id}/status")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status["status"], "paused");
}

#[tokio::test]
async fn data_for_unknown_run_is_404_but_known_run_never_fails() {
    let app = test_app();
    let (initial, evaluator) = write_artifacts(app.dir.path());

    let response = app
        .router
        .clone()
        .oneshot(get("/api/evolution/ghost/data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router
        .clone()
        .oneshot(post(
            "/api/evolution/start",
            json!({ "initial_program": initial, "evaluator": evaluator }),
        ))
        .await
        .unwrap();
    let run_id = body_json(response).await["run_id"]
        .as_str()
        .unwrap()
        .to_owned();

    let response = app
        .router
        .oneshot(get(&format!("/api/evolution/{run_id}/data")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await;
    assert!(data["nodes"].is_array());
    assert!(data["edges"].is_array());
    assert!(data["archive"].is_array());
}

#[tokio::test]
async fn logs_for_run_without_log_dir_is_empty_list() {
    let app = test_app();
    let (initial, evaluator) = write_artifacts(app.dir.path());

    let response = app
        .router
        .clone()
        .oneshot(post(
            "/api/evolution/start",
            json!({ "initial_program": initial, "evaluator": evaluator }),
        ))
        .await
        .unwrap();
    let run_id = body_json(response).await["run_id"]
        .as_str()
        .unwrap()
        .to_owned();

    let response = app
        .router
        .oneshot(get(&format!("/api/evolution/{run_id}/logs")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["logs"], json!([]));
}

#[tokio::test]
async fn config_get_put_roundtrip() {
    let app = test_app();

    let response = app.router.clone().oneshot(get("/api/config")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["max_iterations"], 100);

    let response = app
        .router
        .clone()
        .oneshot(put("/api/config", json!({ "max_iterations": 42 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["max_iterations"], 42);
    // Untouched keys keep their values through the merge.
    assert_eq!(updated["checkpoint_interval"], 100);

    let response = app.router.oneshot(get("/api/config")).await.unwrap();
    assert_eq!(body_json(response).await["max_iterations"], 42);
}

#[tokio::test]
async fn config_update_rejects_invalid_values() {
    let app = test_app();
    let response = app
        .router
        .oneshot(put("/api/config", json!({ "max_iterations": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn config_validate_never_4xxs() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(post("/api/config/validate", json!({ "max_iterations": 10 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["valid"], true);

    let response = app
        .router
        .oneshot(post("/api/config/validate", json!({ "max_iterations": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], false);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn projects_discovery_lists_complete_projects() {
    let app = test_app();
    let base = app.dir.path().join("examples");
    let proj = base.join("demo");
    std::fs::create_dir_all(&proj).unwrap();
    std::fs::write(proj.join("initial_program.py"), "x").unwrap();
    std::fs::write(proj.join("evaluator.py"), "y").unwrap();

    let uri = format!("/api/projects?base_dir={}", base.display());
    let response = app.router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let projects = body_json(response).await;
    assert_eq!(projects.as_array().unwrap().len(), 1);
    assert_eq!(projects[0]["name"], "demo");

    let uri = format!("/api/projects/demo?base_dir={}", base.display());
    let response = app.router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn arbitrary_data_path_returns_empty_structure() {
    let app = test_app();
    let uri = format!("/api/data?path={}", app.dir.path().display());
    let response = app.router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await;
    assert_eq!(data["nodes"], json!([]));
}
