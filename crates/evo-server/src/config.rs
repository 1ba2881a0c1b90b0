//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Tunables for the HTTP/WebSocket server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
    /// Maximum admitted WebSocket connections; further upgrades are
    /// closed immediately after the handshake.
    pub max_connections: usize,
    /// Outbound queue depth per connection, in messages.
    pub outbound_queue: usize,
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// How long a terminal run is retained before eviction.
    pub run_retention: Duration,
    /// Interval between eviction sweeps.
    pub eviction_interval: Duration,
    /// Grace period for draining connections at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8765,
            max_connections: 256,
            outbound_queue: 256,
            ping_interval: Duration::from_secs(30),
            run_retention: Duration::from_secs(30 * 60),
            eviction_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_8765() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr().to_string(), "127.0.0.1:8765");
    }
}
