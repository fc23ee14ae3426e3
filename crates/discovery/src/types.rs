use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use armorlink_protocol::constants::WS_PATH;
use serde::{Deserialize, Serialize};

/// Default TTL for mDNS records (seconds).
pub const DEFAULT_TTL: u64 = 120;

/// A Bridge discovered via mDNS, or entered manually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredBridge {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub version: String,
    /// Whether the Bridge serves its API over TLS.
    pub tls: bool,
    #[serde(skip)]
    pub ips: Vec<IpAddr>,
    #[serde(skip)]
    pub discovered_at: Option<Instant>,
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl DiscoveredBridge {
    /// Builds a bridge entry from a manually entered host and port.
    ///
    /// Manual connections assume TLS — the fingerprint verification step
    /// that follows selection is what establishes trust.
    pub fn manual(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            id: format!("{host}:{port}"),
            name: host.clone(),
            host,
            port,
            version: String::new(),
            tls: true,
            ips: vec![],
            discovered_at: Some(Instant::now()),
            last_seen: Some(Instant::now()),
        }
    }

    /// Returns the address (IP:port or host:port) for reaching the bridge.
    pub fn address(&self) -> String {
        if let Some(ip) = self.ips.first() {
            format!("{ip}:{}", self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Returns the HTTP base URL for the bridge API.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.address())
    }

    /// Returns the WebSocket URL for the bridge.
    pub fn websocket_url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}{WS_PATH}", self.address())
    }

    /// Returns true if the bridge hasn't been seen recently.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        match self.last_seen {
            Some(last) => last.elapsed() > timeout,
            None => true,
        }
    }
}

/// A discovery or loss event.
#[derive(Debug, Clone)]
pub struct DiscoveryEvent {
    pub event_type: EventType,
    pub bridge: DiscoveredBridge,
}

/// Type of discovery event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Discovered,
    Updated,
    Lost,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Discovered => write!(f, "discovered"),
            EventType::Updated => write!(f, "updated"),
            EventType::Lost => write!(f, "lost"),
        }
    }
}
