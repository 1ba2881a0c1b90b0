//! Bridge from the in-process event bus to WebSocket clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use evo_core::EvolutionEvent;

use super::broadcast::BroadcastManager;

/// Forwards bus events to the connection registry.
pub struct EventBridge {
    manager: Arc<BroadcastManager>,
    receiver: broadcast::Receiver<EvolutionEvent>,
    cancel: CancellationToken,
}

impl EventBridge {
    /// Build a bridge over the given bus receiver.
    pub fn new(
        manager: Arc<BroadcastManager>,
        receiver: broadcast::Receiver<EvolutionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manager,
            receiver,
            cancel,
        }
    }

    /// Consume the bus until it closes or shutdown is signalled.
    ///
    /// Falling behind (`Lagged`) skips the lost events and keeps going;
    /// delivery is fire-and-forget by design of the event model.
    pub async fn run(mut self) {
        info!("event bridge started");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("event bridge stopping");
                    break;
                }
                result = self.receiver.recv() => match result {
                    Ok(event) => {
                        debug!(event = event.event_type(), "forwarding event");
                        self.manager.dispatch(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event bridge lagged, events lost");
                        metrics::counter!("event_bridge_lagged").increment(skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("event bus closed, bridge exiting");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::ClientConnection;

    #[tokio::test]
    async fn forwards_bus_events_to_subscribers() {
        let manager = Arc::new(BroadcastManager::new());
        let (conn, mut rx) = ClientConnection::new("c1".into(), 16);
        manager.add(Arc::new(conn));
        manager.subscribe("c1", "r1");

        let (bus, bus_rx) = broadcast::channel(16);
        let bridge = EventBridge::new(manager.clone(), bus_rx, CancellationToken::new());
        let handle = tokio::spawn(bridge.run());

        let _ = bus
            .send(EvolutionEvent::EvolutionComplete { run_id: "r1".into() })
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert!(msg.contains("evolution_complete"));

        drop(bus);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn exits_on_cancellation() {
        let manager = Arc::new(BroadcastManager::new());
        let (_bus, bus_rx) = broadcast::channel::<EvolutionEvent>(16);
        let cancel = CancellationToken::new();
        let bridge = EventBridge::new(manager, bus_rx, cancel.clone());
        let handle = tokio::spawn(bridge.run());

        cancel.cancel();
        handle.await.unwrap();
    }
}
