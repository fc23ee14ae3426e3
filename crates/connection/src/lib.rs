//! Resilient connection manager for the Bridge WebSocket channel.
//!
//! Keeps exactly one logical connection alive: automatic reconnection with
//! exponential backoff and jitter, an application-level heartbeat, and
//! best-effort queuing of outbound messages while disconnected.

pub mod manager;
pub mod queue;
pub(crate) mod pumps;
pub(crate) mod reconnect;
pub mod types;

pub use manager::ConnectionManager;
pub use queue::OutboundQueue;
pub use types::{ConnectionConfig, ConnectionState};

use tokio_tungstenite::tungstenite;

/// Errors from connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,
}
