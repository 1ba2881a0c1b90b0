//! Graceful-shutdown coordination.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the root cancellation token and fans shutdown out to every
/// subsystem (sessions, bridge, sweeper, run tasks).
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
}

impl ShutdownCoordinator {
    /// Fresh coordinator with an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Child token for one subsystem.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Trigger shutdown.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.root.cancel();
    }

    /// Resolves when shutdown is triggered.
    pub async fn wait(&self) {
        self.root.cancelled().await;
    }

    /// Trigger shutdown and give subsystems up to `timeout` to drain,
    /// polling the provided `drained` predicate.
    pub async fn graceful<F>(&self, timeout: Duration, mut drained: F)
    where
        F: FnMut() -> bool,
    {
        self.shutdown();
        let deadline = tokio::time::Instant::now() + timeout;
        while !drained() {
            if tokio::time::Instant::now() >= deadline {
                warn!("shutdown grace period elapsed with work remaining");
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        info!("all subsystems drained");
    }
}
