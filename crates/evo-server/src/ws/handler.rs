//! Inbound WebSocket message handling.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::broadcast::BroadcastManager;

/// Commands a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ClientCommand {
    Subscribe {
        run_id: String,
    },
    Unsubscribe {
        run_id: String,
    },
}

/// Replies sent directly to the requesting connection.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Reply {
    Subscribed { run_id: String },
    Unsubscribed { run_id: String },
    Pong { data: Value },
    Error { message: String },
}

fn reply(manager: &BroadcastManager, connection_id: &str, reply: &Reply) {
    match serde_json::to_string(reply) {
        Ok(payload) => manager.send_to(connection_id, payload),
        Err(e) => debug!(connection = %connection_id, error = %e, "failed to serialize reply"),
    }
}

/// Handle one text frame from a client.
///
/// Malformed JSON gets an `error` reply; valid JSON with no recognized
/// command gets a `pong` echo. The connection is never terminated for
/// bad input.
pub fn handle_text(manager: &BroadcastManager, connection_id: &str, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Subscribe { run_id }) => {
            // Ack first so it precedes any event delivered to the new
            // subscription.
            reply(
                manager,
                connection_id,
                &Reply::Subscribed {
                    run_id: run_id.clone(),
                },
            );
            manager.subscribe(connection_id, &run_id);
        }
        Ok(ClientCommand::Unsubscribe { run_id }) => {
            reply(
                manager,
                connection_id,
                &Reply::Unsubscribed {
                    run_id: run_id.clone(),
                },
            );
            manager.unsubscribe(connection_id, &run_id);
        }
        Err(_) => match serde_json::from_str::<Value>(text) {
            Ok(value) => reply(manager, connection_id, &Reply::Pong { data: value }),
            Err(e) => reply(
                manager,
                connection_id,
                &Reply::Error {
                    message: format!("invalid JSON: {e}"),
                },
            ),
        },
    }
}
