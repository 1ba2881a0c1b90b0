//! Router assembly and serving.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use evo_config::ConfigStore;

use crate::config::ServerConfig;
use crate::health;
use crate::routes;
use crate::runs::RunManager;
use crate::shutdown::ShutdownCoordinator;
use crate::ws::{session, BroadcastManager};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Run registry.
    pub runs: Arc<RunManager>,
    /// Connection registry / dispatcher.
    pub broadcast: Arc<BroadcastManager>,
    /// UI configuration store.
    pub config_store: Arc<ConfigStore>,
    /// Server tunables.
    pub server_config: ServerConfig,
    /// Shutdown fan-out.
    pub shutdown: ShutdownCoordinator,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Wire up handler state from its collaborators.
    pub fn new(
        runs: Arc<RunManager>,
        broadcast: Arc<BroadcastManager>,
        config_store: Arc<ConfigStore>,
        server_config: ServerConfig,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            runs,
            broadcast,
            config_store,
            server_config,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

async fn ws_upgrade(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| {
        session::run_session(
            socket,
            state.broadcast.clone(),
            state.server_config.clone(),
            state.shutdown.child_token(),
        )
    })
}

/// Build the full application router.
///
/// CORS is permissive: the server binds loopback and serves a local
/// visualizer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health))
        .route("/health", get(health::health))
        .route("/ws", get(ws_upgrade))
        .nest("/api", routes::api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the shutdown coordinator fires.
pub async fn serve(
    router: Router,
    config: &ServerConfig,
    shutdown: ShutdownCoordinator,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
