//! Run registry and lifecycle operations.

pub mod manager;

pub use manager::{RunManager, StartRequest};
