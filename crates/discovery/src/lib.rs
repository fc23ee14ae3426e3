//! mDNS discovery of ArmorClaw Bridges on the local network.

pub mod client;
pub mod platform;
pub mod types;
pub mod validate;

// Re-export primary types.
pub use client::Client;
pub use platform::detect_device_type;
pub use types::{DEFAULT_TTL, DiscoveredBridge, DiscoveryEvent, EventType};
pub use validate::validate_manual_connection;

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid connection: {0}")]
    Invalid(String),
}
