//! Per-client connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::warn;

/// One admitted WebSocket client.
///
/// Outbound traffic goes through a bounded mpsc channel drained by the
/// session's write task; [`send`](Self::send) never blocks the caller.
pub struct ClientConnection {
    id: String,
    outbound: mpsc::Sender<String>,
    connected_at: Instant,
    alive: AtomicBool,
    dropped: AtomicU64,
}

impl ClientConnection {
    /// Create a connection with the given outbound queue depth.
    ///
    /// Returns the connection and the receiving half for the write task.
    pub fn new(id: String, queue: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue);
        (
            Self {
                id,
                outbound: tx,
                connected_at: Instant::now(),
                alive: AtomicBool::new(true),
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Connection identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// How long the client has been connected.
    pub fn uptime(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Enqueue a serialized message without blocking.
    ///
    /// Returns `false` if the channel is closed; the caller should then
    /// deregister the connection. A full queue drops the message, bumps
    /// the drop counter and keeps the connection (slow consumer, not a
    /// dead one).
    pub fn send(&self, message: String) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(connection = %self.id, dropped, "outbound queue full, dropping message");
                }
                metrics::counter!("ws_messages_dropped").increment(1);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Record pong receipt (or any inbound traffic).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Consume the liveness flag; `false` means nothing was heard since
    /// the previous check.
    pub fn check_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Messages dropped due to a full outbound queue.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (conn, mut rx) = ClientConnection::new("c1".into(), 4);
        assert!(conn.send("hello".into()));
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn full_queue_drops_but_keeps_connection() {
        let (conn, _rx) = ClientConnection::new("c1".into(), 1);
        assert!(conn.send("one".into()));
        assert!(conn.send("two".into()));
        assert_eq!(conn.dropped_messages(), 1);
    }

    #[tokio::test]
    async fn closed_channel_reports_dead() {
        let (conn, rx) = ClientConnection::new("c1".into(), 1);
        drop(rx);
        assert!(!conn.send("one".into()));
    }

    #[tokio::test]
    async fn liveness_flag_is_consumed() {
        let (conn, _rx) = ClientConnection::new("c1".into(), 1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }
}
