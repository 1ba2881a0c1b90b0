//! Connection registry and broadcast dispatcher.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use evo_core::{EventScope, EvolutionEvent};

use super::connection::ClientConnection;

/// Registry of admitted connections plus per-run subscriber sets.
///
/// Subscriptions are many-to-many: a connection may follow any number of
/// runs and a run may have any number of followers. Lock discipline:
/// `parking_lot` locks, never held across an await.
#[derive(Default)]
pub struct BroadcastManager {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    run_subscribers: RwLock<HashMap<String, HashSet<String>>>,
}

impl BroadcastManager {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self.try_add(connection, usize::MAX);
    }

    /// Admit a connection unless the registry already holds `limit`
    /// connections. The check and the insert happen under one write
    /// lock, so racing admissions cannot overshoot the limit.
    pub fn try_add(&self, connection: Arc<ClientConnection>, limit: usize) -> bool {
        let id = connection.id().to_owned();
        let count = {
            let mut connections = self.connections.write();
            if connections.len() >= limit {
                return false;
            }
            let _ = connections.insert(id.clone(), connection);
            connections.len()
        };
        metrics::gauge!("ws_connections").set(count as f64);
        info!(connection = %id, total = count, "client connected");
        true
    }

    /// Remove a connection and every subscription it holds. Idempotent.
    pub fn remove(&self, connection_id: &str) {
        let removed = self.connections.write().remove(connection_id).is_some();
        {
            let mut subs = self.run_subscribers.write();
            for set in subs.values_mut() {
                let _ = set.remove(connection_id);
            }
            subs.retain(|_, set| !set.is_empty());
        }
        if removed {
            let count = self.connections.read().len();
            metrics::gauge!("ws_connections").set(count as f64);
            info!(connection = %connection_id, total = count, "client disconnected");
        }
    }

    /// Subscribe a connection to a run's events.
    ///
    /// Unknown run ids are accepted: a client may subscribe before the
    /// run exists or after it ended. No-op for unknown connections.
    pub fn subscribe(&self, connection_id: &str, run_id: &str) {
        if !self.connections.read().contains_key(connection_id) {
            return;
        }
        let inserted = self
            .run_subscribers
            .write()
            .entry(run_id.to_owned())
            .or_default()
            .insert(connection_id.to_owned());
        if inserted {
            debug!(connection = %connection_id, run = %run_id, "subscribed");
        }
    }

    /// Drop one subscription. Idempotent.
    pub fn unsubscribe(&self, connection_id: &str, run_id: &str) {
        let mut subs = self.run_subscribers.write();
        if let Some(set) = subs.get_mut(run_id) {
            let _ = set.remove(connection_id);
            if set.is_empty() {
                let _ = subs.remove(run_id);
            }
        }
    }

    /// Number of admitted connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Number of subscribers for one run.
    pub fn subscriber_count(&self, run_id: &str) -> usize {
        self.run_subscribers
            .read()
            .get(run_id)
            .map_or(0, HashSet::len)
    }

    /// Route an event by its scope.
    pub fn dispatch(&self, event: &EvolutionEvent) {
        match event.scope() {
            EventScope::AllConnections => self.broadcast_all(event),
            EventScope::Run(run_id) => self.broadcast_to_run(run_id, event),
        }
    }

    /// Deliver an event to every admitted connection.
    pub fn broadcast_all(&self, event: &EvolutionEvent) {
        let Some(payload) = self.serialize(event) else {
            return;
        };
        let targets: Vec<Arc<ClientConnection>> =
            self.connections.read().values().cloned().collect();
        self.deliver(&targets, &payload);
    }

    /// Deliver an event to the run's subscribers. Unknown run → no-op.
    pub fn broadcast_to_run(&self, run_id: &str, event: &EvolutionEvent) {
        let Some(payload) = self.serialize(event) else {
            return;
        };
        let targets: Vec<Arc<ClientConnection>> = {
            let subs = self.run_subscribers.read();
            let Some(ids) = subs.get(run_id) else {
                return;
            };
            let connections = self.connections.read();
            ids.iter()
                .filter_map(|id| connections.get(id).cloned())
                .collect()
        };
        self.deliver(&targets, &payload);
    }

    /// Direct-send to one connection, outside any scope. Used for acks
    /// and error replies.
    pub fn send_to(&self, connection_id: &str, payload: String) {
        let target = self.connections.read().get(connection_id).cloned();
        if let Some(conn) = target {
            if !conn.send(payload) {
                self.remove(connection_id);
            }
        }
    }

    fn serialize(&self, event: &EvolutionEvent) -> Option<String> {
        match event.to_wire_json() {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(event = event.event_type(), error = %e, "failed to serialize event");
                None
            }
        }
    }

    /// Serialize-once fan-out: iterate a snapshot, collect failures,
    /// deregister them after the full pass so delivery to healthy
    /// connections never depends on a dead one.
    fn deliver(&self, targets: &[Arc<ClientConnection>], payload: &str) {
        let mut failed: Vec<String> = Vec::new();
        for conn in targets {
            if !conn.send(payload.to_owned()) {
                failed.push(conn.id().to_owned());
            }
        }
        for id in failed {
            warn!(connection = %id, "send failed, deregistering connection");
            self.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connect(manager: &BroadcastManager, id: &str) -> mpsc::Receiver<String> {
        let (conn, rx) = ClientConnection::new(id.into(), 16);
        manager.add(Arc::new(conn));
        rx
    }

    fn progress(run_id: &str) -> EvolutionEvent {
        EvolutionEvent::EvolutionProgress {
            run_id: run_id.into(),
            iteration: 1,
            best_score: Some(0.5),
        }
    }

    #[tokio::test]
    async fn admission_is_capped_at_the_limit() {
        let manager = BroadcastManager::new();
        let (first, _rx_first) = ClientConnection::new("first".into(), 4);
        let (second, _rx_second) = ClientConnection::new("second".into(), 4);

        assert!(manager.try_add(Arc::new(first), 1));
        assert!(!manager.try_add(Arc::new(second), 1));
        assert_eq!(manager.connection_count(), 1);

        // Room frees up once a connection leaves.
        manager.remove("first");
        let (third, _rx_third) = ClientConnection::new("third".into(), 4);
        assert!(manager.try_add(Arc::new(third), 1));
    }

    #[tokio::test]
    async fn run_event_reaches_only_subscribers() {
        let manager = BroadcastManager::new();
        let mut rx_a = connect(&manager, "a");
        let mut rx_b = connect(&manager, "b");
        manager.subscribe("a", "run1");

        manager.dispatch(&progress("run1"));

        let msg = rx_a.recv().await.unwrap();
        assert!(msg.contains("evolution_progress"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn started_event_reaches_everyone() {
        let manager = BroadcastManager::new();
        let mut rx_a = connect(&manager, "a");
        let mut rx_b = connect(&manager, "b");

        manager.dispatch(&EvolutionEvent::EvolutionStarted {
            run_id: "run1".into(),
        });

        assert!(rx_a.recv().await.unwrap().contains("evolution_started"));
        assert!(rx_b.recv().await.unwrap().contains("evolution_started"));
    }

    #[tokio::test]
    async fn unknown_run_broadcast_is_a_noop() {
        let manager = BroadcastManager::new();
        let mut rx = connect(&manager, "a");
        manager.broadcast_to_run("ghost", &progress("ghost"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_before_run_exists_is_accepted() {
        let manager = BroadcastManager::new();
        let mut rx = connect(&manager, "a");
        manager.subscribe("a", "future-run");
        manager.broadcast_to_run("future-run", &progress("future-run"));
        assert!(rx.recv().await.unwrap().contains("evolution_progress"));
    }

    #[tokio::test]
    async fn failed_send_deregisters_everywhere() {
        let manager = BroadcastManager::new();
        let rx = connect(&manager, "a");
        manager.subscribe("a", "run1");
        drop(rx);

        manager.broadcast_to_run("run1", &progress("run1"));

        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.subscriber_count("run1"), 0);
    }

    #[tokio::test]
    async fn one_dead_connection_does_not_starve_others() {
        let manager = BroadcastManager::new();
        let dead = connect(&manager, "dead");
        let mut live = connect(&manager, "live");
        manager.subscribe("dead", "run1");
        manager.subscribe("live", "run1");
        drop(dead);

        manager.broadcast_to_run("run1", &progress("run1"));

        assert!(live.recv().await.unwrap().contains("evolution_progress"));
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_clears_subscriptions() {
        let manager = BroadcastManager::new();
        let _rx = connect(&manager, "a");
        manager.subscribe("a", "run1");
        manager.subscribe("a", "run2");

        manager.remove("a");
        manager.remove("a");

        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.subscriber_count("run1"), 0);
        assert_eq!(manager.subscriber_count("run2"), 0);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let manager = BroadcastManager::new();
        let _rx = connect(&manager, "a");
        manager.subscribe("a", "run1");
        manager.unsubscribe("a", "run1");
        manager.unsubscribe("a", "run1");
        assert_eq!(manager.subscriber_count("run1"), 0);
    }

    #[tokio::test]
    async fn subscription_survives_for_multiple_runs() {
        let manager = BroadcastManager::new();
        let mut rx = connect(&manager, "a");
        manager.subscribe("a", "run1");
        manager.subscribe("a", "run2");

        manager.broadcast_to_run("run1", &progress("run1"));
        manager.broadcast_to_run("run2", &progress("run2"));

        assert!(rx.recv().await.unwrap().contains("run1"));
        assert!(rx.recv().await.unwrap().contains("run2"));
    }
}
