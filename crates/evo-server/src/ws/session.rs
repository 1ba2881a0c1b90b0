//! One WebSocket session, from upgrade to disconnect.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler;

/// Drive a freshly upgraded socket until either side disconnects.
///
/// The socket is split: a write task drains the connection's outbound
/// queue, the read loop handles client frames, and a ping ticker checks
/// liveness. Registration in the manager happens first and removal is
/// guaranteed on every exit path.
pub async fn run_session(
    socket: WebSocket,
    manager: Arc<BroadcastManager>,
    config: ServerConfig,
    cancel: CancellationToken,
) {
    let connection_id = Uuid::new_v4().to_string();
    let (connection, outbound_rx) =
        ClientConnection::new(connection_id.clone(), config.outbound_queue);
    let connection = Arc::new(connection);
    if !manager.try_add(connection.clone(), config.max_connections) {
        warn!(limit = config.max_connections, "connection limit reached, refusing client");
        let mut socket = socket;
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 1013, // try again later
                reason: "server at capacity".into(),
            })))
            .await;
        return;
    }

    let (ws_tx, ws_rx) = socket.split();
    let writer = tokio::spawn(write_loop(ws_tx, outbound_rx, config.ping_interval));

    read_loop(ws_rx, &manager, &connection, &config, &cancel).await;

    // Removal plus the local drop releases the last sender, which ends
    // the write task and closes the socket.
    manager.remove(&connection_id);
    drop(connection);
    let _ = writer.await;
    info!(connection = %connection_id, "session ended");
}

/// Drain the outbound queue onto the socket, interleaving periodic
/// protocol Ping frames.
async fn write_loop(
    mut ws_tx: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
    ping_interval: std::time::Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            payload = outbound_rx.recv() => match payload {
                Some(payload) => {
                    if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = ws_tx.close().await;
}

async fn read_loop(
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    manager: &Arc<BroadcastManager>,
    connection: &Arc<ClientConnection>,
    config: &ServerConfig,
    cancel: &CancellationToken,
) {
    // Liveness window: two ping intervals with no inbound traffic at
    // all (not even a Pong) drops the session.
    let mut liveness = tokio::time::interval(config.ping_interval * 2);
    liveness.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let _ = liveness.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(connection = %connection.id(), "session cancelled by shutdown");
                break;
            }
            _ = liveness.tick() => {
                if !connection.check_alive() {
                    warn!(connection = %connection.id(), "no traffic in liveness window, closing");
                    break;
                }
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    connection.mark_alive();
                    handler::handle_text(manager, connection.id(), text.as_str());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    connection.mark_alive();
                }
                Some(Ok(Message::Binary(_))) => {
                    // Text protocol only; binary frames are ignored.
                    connection.mark_alive();
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(connection = %connection.id(), "client closed");
                    break;
                }
                Some(Err(e)) => {
                    debug!(connection = %connection.id(), error = %e, "socket error");
                    break;
                }
            },
        }
    }
}
