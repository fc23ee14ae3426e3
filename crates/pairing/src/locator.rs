//! Bridge discovery seam for the pairing coordinator.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use armorlink_discovery::DiscoveryError;
use armorlink_discovery::client::Client as DiscoveryClient;
use armorlink_discovery::types::{DiscoveredBridge, DiscoveryEvent};
use armorlink_discovery::validate::validate_manual_connection;

/// Finds Bridges and validates manual connection details.
#[async_trait]
pub trait BridgeLocator: Send + Sync {
    /// Runs one discovery pass and returns the bridges found.
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredBridge>, DiscoveryError>;

    /// Starts continuous discovery; events flow until the token is
    /// cancelled.
    fn watch(&self, cancel: CancellationToken) -> mpsc::Receiver<DiscoveryEvent>;

    /// Checks that a manually entered host/port is plausible.
    fn validate_manual(&self, host: &str, port: u16) -> Result<(), DiscoveryError>;
}

const PRUNE_INTERVAL: Duration = Duration::from_secs(5);

/// mDNS-backed locator.
pub struct MdnsBridgeLocator {
    client: DiscoveryClient,
}

impl MdnsBridgeLocator {
    pub fn new() -> Self {
        Self {
            client: DiscoveryClient::new(),
        }
    }
}

impl Default for MdnsBridgeLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeLocator for MdnsBridgeLocator {
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredBridge>, DiscoveryError> {
        self.client.discover(timeout).await
    }

    fn watch(&self, cancel: CancellationToken) -> mpsc::Receiver<DiscoveryEvent> {
        self.client.watch(cancel, PRUNE_INTERVAL)
    }

    fn validate_manual(&self, host: &str, port: u16) -> Result<(), DiscoveryError> {
        validate_manual_connection(host, port)
    }
}
