//! Evolution server daemon.
//!
//! Composition root: CLI parsing, tracing setup, collaborator wiring
//! and the serve loop with graceful shutdown.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use evo_config::{ui_config_path, ConfigStore};
use evo_engine::simulated::SimulatedEngineFactory;
use evo_server::logging::WsLogLayer;
use evo_server::runs::RunManager;
use evo_server::server::{build_router, serve, AppState};
use evo_server::shutdown::ShutdownCoordinator;
use evo_server::ws::{BroadcastManager, EventBridge};
use evo_server::ServerConfig;

/// Evolution run-orchestration server.
#[derive(Debug, Parser)]
#[command(name = "evod", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to bind.
    #[arg(long, default_value_t = 8765)]
    port: u16,

    /// Log filter (overridden by RUST_LOG when set).
    #[arg(long, default_value = "info")]
    log_level: String,
}

const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let server_config = ServerConfig {
        host: cli.host,
        port: cli.port,
        ..ServerConfig::default()
    };

    let (bus, bridge_rx) = broadcast::channel(EVENT_BUS_CAPACITY);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(WsLogLayer::new(bus.clone()))
        .init();

    let config_store = Arc::new(ConfigStore::new(ui_config_path()));
    config_store.load_persistent();

    let broadcast_manager = Arc::new(BroadcastManager::new());
    let runs = Arc::new(RunManager::new(
        Arc::new(SimulatedEngineFactory),
        config_store.clone(),
        bus,
        server_config.run_retention,
    ));

    let shutdown = ShutdownCoordinator::new();

    let bridge = EventBridge::new(
        broadcast_manager.clone(),
        bridge_rx,
        shutdown.child_token(),
    );
    let bridge_task = tokio::spawn(bridge.run());

    let sweeper_task = tokio::spawn(eviction_sweeper(
        runs.clone(),
        server_config.eviction_interval,
        shutdown.child_token(),
    ));

    let signal_shutdown = shutdown.clone();
    let _signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_shutdown.shutdown();
        }
    });

    let state = AppState::new(
        runs.clone(),
        broadcast_manager.clone(),
        config_store,
        server_config.clone(),
        shutdown.clone(),
    );
    let router = build_router(state);

    serve(router, &server_config, shutdown.clone())
        .await
        .context("server error")?;

    info!("draining for shutdown");
    runs.shutdown();
    shutdown
        .graceful(server_config.shutdown_timeout, || {
            broadcast_manager.connection_count() == 0
        })
        .await;
    bridge_task.abort();
    sweeper_task.abort();
    info!("shutdown complete");
    Ok(())
}

/// Periodically drop terminal runs past the retention window.
async fn eviction_sweeper(
    runs: Arc<RunManager>,
    interval: std::time::Duration,
    cancel: tokio_util::sync::CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = runs.evict_finished();
                if evicted > 0 {
                    info!(evicted, "evicted finished runs");
                }
            }
        }
    }
}
