//! mDNS browsing for Bridges.
//!
//! Two modes: [`Client::discover`] runs a single bounded browse pass and
//! returns what it found; [`Client::watch`] browses continuously in a
//! background task, emitting [`DiscoveryEvent`]s (including `Lost` for
//! bridges that stop announcing) until cancelled. Both feed the same
//! known-bridge table.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use armorlink_protocol::constants::SERVICE_NAME;

use crate::DiscoveryError;
use crate::types::{DEFAULT_TTL, DiscoveredBridge, DiscoveryEvent, EventType};

type BridgeTable = Arc<RwLock<HashMap<String, DiscoveredBridge>>>;

fn service_type() -> String {
    format!("{SERVICE_NAME}.local.")
}

/// Discovers Bridges on the local network via mDNS/DNS-SD.
pub struct Client {
    known: BridgeTable,
    stale_after: Duration,
}

impl Client {
    pub fn new() -> Self {
        Self::with_stale_after(Duration::from_secs(DEFAULT_TTL))
    }

    /// `stale_after` controls when a silent bridge is pruned by `watch`.
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            known: Arc::new(RwLock::new(HashMap::new())),
            stale_after,
        }
    }

    /// Runs one bounded browse pass and returns the bridges resolved
    /// during it.
    pub async fn discover(
        &self,
        timeout: Duration,
    ) -> Result<Vec<DiscoveredBridge>, DiscoveryError> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Mdns(format!("failed to create mDNS daemon: {e}")))?;
        let events = daemon
            .browse(&service_type())
            .map_err(|e| DiscoveryError::Mdns(format!("failed to browse mDNS: {e}")))?;

        let mut found = Vec::new();
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            // The mdns-sd receiver is blocking; poll it in short slices so
            // the deadline stays responsive.
            let poll = tokio::task::spawn_blocking({
                let events = events.clone();
                move || events.recv_timeout(Duration::from_millis(100))
            });
            match tokio::time::timeout(remaining, poll).await {
                Ok(Ok(Ok(event))) => {
                    if let Some((bridge, _)) = absorb(&self.known, &event) {
                        found.push(bridge);
                    }
                }
                Ok(_) => {} // empty slice, keep polling
                Err(_) => break,
            }
        }

        let _ = daemon.shutdown();
        Ok(found)
    }

    /// Browses continuously until the token is cancelled.
    ///
    /// Events arrive on the returned channel; bridges silent for longer
    /// than `stale_after` are dropped from the table and reported as
    /// [`EventType::Lost`]. A single daemon serves the whole watch, since
    /// repeated create/destroy cycles make `mdns_sd` log noisy shutdown
    /// errors.
    pub fn watch(
        &self,
        cancel: CancellationToken,
        prune_interval: Duration,
    ) -> mpsc::Receiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::channel(16);
        let known = self.known.clone();
        let stale_after = self.stale_after;

        tokio::spawn(async move {
            let daemon = match ServiceDaemon::new() {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "failed to create mDNS daemon");
                    return;
                }
            };
            let events = match daemon.browse(&service_type()) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "failed to browse mDNS");
                    let _ = daemon.shutdown();
                    return;
                }
            };

            let mut prune = tokio::time::interval(prune_interval);
            prune.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = prune.tick() => {
                        for bridge in prune_stale(&known, stale_after) {
                            let _ = tx.try_send(DiscoveryEvent {
                                event_type: EventType::Lost,
                                bridge,
                            });
                        }
                    }
                    polled = tokio::task::spawn_blocking({
                        let events = events.clone();
                        move || events.recv_timeout(Duration::from_millis(500))
                    }) => {
                        if let Ok(Ok(event)) = polled {
                            if let Some((bridge, event_type)) = absorb(&known, &event) {
                                if tx.send(DiscoveryEvent { event_type, bridge }).await.is_err() {
                                    break; // receiver gone
                                }
                            }
                        }
                    }
                }
            }
            let _ = daemon.shutdown();
        });

        rx
    }

    /// Snapshot of every bridge currently in the table.
    pub fn known_bridges(&self) -> Vec<DiscoveredBridge> {
        self.known
            .read()
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds a resolved service into the table, reporting whether it was new.
fn absorb(known: &BridgeTable, event: &ServiceEvent) -> Option<(DiscoveredBridge, EventType)> {
    let ServiceEvent::ServiceResolved(info) = event else {
        return None;
    };
    let bridge = bridge_from_service(info);

    let mut table = known.write().ok()?;
    let event_type = match table.get_mut(&bridge.id) {
        Some(existing) => {
            existing.last_seen = bridge.last_seen;
            existing.ips = bridge.ips.clone();
            existing.port = bridge.port;
            EventType::Updated
        }
        None => {
            table.insert(bridge.id.clone(), bridge.clone());
            EventType::Discovered
        }
    };
    Some((bridge, event_type))
}

/// Removes and returns every bridge that went silent.
fn prune_stale(known: &BridgeTable, stale_after: Duration) -> Vec<DiscoveredBridge> {
    let Ok(mut table) = known.write() else {
        return Vec::new();
    };
    let stale: Vec<String> = table
        .iter()
        .filter(|(_, bridge)| bridge.is_stale(stale_after))
        .map(|(id, _)| id.clone())
        .collect();
    stale.iter().filter_map(|id| table.remove(id)).collect()
}

/// Maps a resolved mDNS service onto a [`DiscoveredBridge`].
///
/// TXT keys follow the bridge's advertisement: `id`, `name`, `version`,
/// `tls`. Missing id/name fall back to the mDNS fullname/hostname.
fn bridge_from_service(info: &ServiceInfo) -> DiscoveredBridge {
    let mut id = String::new();
    let mut name = String::new();
    let mut version = String::new();
    let mut tls = false;

    for property in info.get_properties().iter() {
        match property.key() {
            "id" => id = property.val_str().to_string(),
            "name" => name = property.val_str().to_string(),
            "version" => version = property.val_str().to_string(),
            "tls" => tls = matches!(property.val_str(), "true" | "1"),
            _ => {}
        }
    }
    if id.is_empty() {
        id = info.get_fullname().to_string();
    }
    if name.is_empty() {
        name = info.get_hostname().to_string();
    }

    // Routable IPv4 only; loopback and link-local announcements are
    // useless for reaching the bridge.
    let ips: Vec<IpAddr> = info
        .get_addresses()
        .iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(v4)
                if !v4.is_loopback() && !v4.is_link_local() =>
            {
                Some(IpAddr::V4(*v4))
            }
            _ => None,
        })
        .collect();

    let now = Instant::now();
    DiscoveredBridge {
        id,
        name,
        host: info.get_hostname().to_string(),
        port: info.get_port(),
        version,
        tls,
        ips,
        discovered_at: Some(now),
        last_seen: Some(now),
    }
}
