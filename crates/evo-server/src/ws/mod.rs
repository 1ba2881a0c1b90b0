//! WebSocket connection management and event fan-out.

pub mod broadcast;
pub mod connection;
pub mod event_bridge;
pub mod handler;
pub mod session;

pub use broadcast::BroadcastManager;
pub use connection::ClientConnection;
pub use event_bridge::EventBridge;
