//! Pairing flow coordinator.
//!
//! Owns the pairing state machine and the single in-flight approval
//! poll. Collaborator failures never escape to callers — they surface
//! as error messages on the published [`PairingState`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use armorlink_bridge_api::{BridgeApi, RegisterDeviceRequest};
use armorlink_discovery::platform::detect_device_type;
use armorlink_discovery::types::{DiscoveredBridge, EventType};
use armorlink_protocol::{PairingInfo, parse_qr_payload};

use crate::keys::KeyService;
use crate::locator::BridgeLocator;
use crate::session::SessionStore;
use crate::state::{PairingState, PairingStep};

/// Extra slack on the local watchdog around each approval call, so the
/// API client's own timeout fires first.
const POLL_CALL_MARGIN: Duration = Duration::from_secs(2);

/// Tunables for the pairing flow.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Name shown to the Bridge admin in the approval prompt.
    pub device_name: String,
    /// Platform identifier sent at registration.
    pub device_type: String,
    /// Sleep between approval poll attempts.
    pub poll_interval: Duration,
    /// Timeout handed to each wait-for-approval call.
    pub poll_call_timeout: Duration,
    /// Poll attempts before giving up on approval.
    pub max_poll_attempts: u32,
    /// Duration of one discovery pass.
    pub discovery_timeout: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            device_name: "ArmorLink Device".into(),
            device_type: detect_device_type().into(),
            poll_interval: Duration::from_secs(5),
            poll_call_timeout: Duration::from_secs(5),
            max_poll_attempts: 60,
            discovery_timeout: Duration::from_secs(5),
        }
    }
}

/// Drives the pairing handshake against a Bridge.
pub struct PairingCoordinator {
    api: Arc<dyn BridgeApi>,
    keys: Arc<dyn KeyService>,
    sessions: Arc<SessionStore>,
    locator: Arc<dyn BridgeLocator>,
    config: PairingConfig,
    state_tx: Arc<watch::Sender<PairingState>>,
    state_rx: watch::Receiver<PairingState>,
    /// Cancel token for the active approval poll.
    poll_cancel: std::sync::Mutex<Option<CancellationToken>>,
    /// Cancel token for the active bridge watch.
    watch_cancel: std::sync::Mutex<Option<CancellationToken>>,
}

impl PairingCoordinator {
    pub fn new(
        api: Arc<dyn BridgeApi>,
        keys: Arc<dyn KeyService>,
        sessions: Arc<SessionStore>,
        locator: Arc<dyn BridgeLocator>,
        config: PairingConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(PairingState::new());
        Self {
            api,
            keys,
            sessions,
            locator,
            config,
            state_tx: Arc::new(state_tx),
            state_rx,
            poll_cancel: std::sync::Mutex::new(None),
            watch_cancel: std::sync::Mutex::new(None),
        }
    }

    /// Current pairing state snapshot.
    pub fn state(&self) -> PairingState {
        self.state_rx.borrow().clone()
    }

    /// Subscribes to state changes. The receiver starts at the current
    /// snapshot and observes every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<PairingState> {
        self.state_rx.clone()
    }

    fn update(&self, f: impl FnOnce(&mut PairingState)) {
        self.state_tx.send_modify(f);
    }

    /// Runs one discovery pass and merges the results into
    /// `discovered_bridges`. Does not change the current step; discovery
    /// failures surface as a transient error message.
    pub async fn start_discovery(&self) {
        self.update(|s| {
            s.discovering = true;
            s.error = None;
        });

        let result = self.locator.discover(self.config.discovery_timeout).await;

        self.update(|s| {
            s.discovering = false;
            match result {
                Ok(bridges) => {
                    for bridge in bridges {
                        match s.discovered_bridges.iter_mut().find(|b| b.id == bridge.id) {
                            Some(existing) => *existing = bridge,
                            None => s.discovered_bridges.push(bridge),
                        }
                    }
                }
                Err(ref e) => {
                    warn!(error = %e, "bridge discovery failed");
                    s.error = Some(format!("Discovery failed: {e}"));
                }
            }
        });
    }

    /// Starts background discovery that keeps `discovered_bridges` current
    /// until stopped: new and re-announced bridges are merged in, bridges
    /// that go silent are removed. Replaces any previous watch.
    pub fn start_bridge_watch(&self) {
        self.stop_bridge_watch();
        let cancel = CancellationToken::new();
        if let Ok(mut guard) = self.watch_cancel.lock() {
            *guard = Some(cancel.clone());
        }

        let mut events = self.locator.watch(cancel.clone());
        let state_tx = self.state_tx.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    e = events.recv() => match e {
                        Some(e) => e,
                        None => break,
                    },
                };
                state_tx.send_modify(|s| match event.event_type {
                    EventType::Lost => {
                        s.discovered_bridges.retain(|b| b.id != event.bridge.id);
                    }
                    EventType::Discovered | EventType::Updated => {
                        match s
                            .discovered_bridges
                            .iter_mut()
                            .find(|b| b.id == event.bridge.id)
                        {
                            Some(existing) => *existing = event.bridge.clone(),
                            None => s.discovered_bridges.push(event.bridge.clone()),
                        }
                    }
                });
            }
        });
    }

    /// Stops the background bridge watch, if one is running.
    pub fn stop_bridge_watch(&self) {
        if let Ok(mut guard) = self.watch_cancel.lock()
            && let Some(token) = guard.take()
        {
            token.cancel();
        }
    }

    /// Selects a bridge and fetches its certificate fingerprint for the
    /// user to confirm. A fetch failure reverts to BridgeSelect but keeps
    /// the selection — only explicit rejection clears it.
    pub async fn select_bridge(&self, bridge: DiscoveredBridge) {
        let base_url = bridge.base_url();
        self.update(|s| {
            s.selected_bridge = Some(bridge);
            s.step = PairingStep::CertificateVerify;
            s.error = None;
        });

        match self.api.get_certificate_fingerprint(&base_url).await {
            Ok(fingerprint) => {
                debug!(%fingerprint, "fetched certificate fingerprint");
                self.update(|s| s.certificate_fingerprint = Some(fingerprint));
            }
            Err(e) => {
                warn!(error = %e, url = %base_url, "fingerprint fetch failed");
                self.update(|s| {
                    s.step = PairingStep::BridgeSelect;
                    s.error = Some(format!("Could not reach bridge: {e}"));
                });
            }
        }
    }

    /// Connects to a manually entered bridge. Validation failures set an
    /// error without leaving the current step.
    pub async fn set_manual_connection(&self, host: &str, port: u16) {
        if let Err(e) = self.locator.validate_manual(host, port) {
            self.update(|s| s.error = Some(e.to_string()));
            return;
        }
        self.select_bridge(DiscoveredBridge::manual(host.trim(), port))
            .await;
    }

    /// Records the user's verdict on the certificate fingerprint.
    pub fn verify_certificate(&self, accepted: bool) {
        if accepted {
            self.update(|s| {
                s.step = PairingStep::QrScan;
                s.error = None;
            });
        } else {
            self.update(|s| {
                s.selected_bridge = None;
                s.certificate_fingerprint = None;
                s.step = PairingStep::BridgeSelect;
                s.error = Some("Certificate rejected".into());
            });
        }
    }

    /// Parses a scanned QR payload and, on success, registers the device.
    pub async fn process_qr_code(&self, data: &str) {
        match parse_qr_payload(data) {
            Ok(info) => {
                self.update(|s| s.pairing_info = Some(info.clone()));
                self.register_device(info).await;
            }
            Err(e) => {
                self.update(|s| s.error = Some(format!("Invalid QR code: {e}")));
            }
        }
    }

    /// Registers with a manually entered pairing token, bypassing the QR
    /// scan. The selected bridge provides the server URL; the token gets
    /// the default expiry.
    pub async fn set_pairing_token(&self, token: &str) {
        let server = self
            .state_rx
            .borrow()
            .selected_bridge
            .as_ref()
            .map(|b| b.base_url())
            .unwrap_or_default();
        let info = PairingInfo::from_token(token, server);
        self.update(|s| s.pairing_info = Some(info.clone()));
        self.register_device(info).await;
    }

    /// Cancels any in-flight approval poll and bridge watch, and resets
    /// to a fresh BridgeSelect snapshot. Safe to call from any state,
    /// idempotent.
    pub fn cancel_pairing(&self) {
        self.cancel_poll();
        self.stop_bridge_watch();
        self.state_tx.send_replace(PairingState::new());
        info!("pairing cancelled");
    }

    /// Recovers from an error: back to QrScan when a bridge is already
    /// selected, otherwise a full reset.
    pub fn retry(&self) {
        self.cancel_poll();
        let has_bridge = self.state_rx.borrow().selected_bridge.is_some();
        if has_bridge {
            self.update(|s| {
                s.step = PairingStep::QrScan;
                s.error = None;
                s.message = None;
            });
        } else {
            self.state_tx.send_replace(PairingState::new());
        }
    }

    /// Registers the device with the Bridge. On success the session is
    /// persisted before the state advances; on any failure the flow
    /// returns to QrScan with nothing persisted.
    async fn register_device(&self, info: PairingInfo) {
        if info.token.is_empty() {
            self.update(|s| {
                s.step = PairingStep::QrScan;
                s.error = Some("Pairing token missing".into());
            });
            return;
        }

        let selected_url = self
            .state_rx
            .borrow()
            .selected_bridge
            .as_ref()
            .map(|b| b.base_url());
        let bridge_url = if !info.server.is_empty() {
            info.server.clone()
        } else if let Some(url) = selected_url {
            url
        } else {
            self.update(|s| {
                s.step = PairingStep::QrScan;
                s.error = Some("No bridge selected".into());
            });
            return;
        };

        self.update(|s| {
            s.step = PairingStep::DeviceRegistration;
            s.error = None;
        });

        let keypair = self.keys.generate_keypair();
        let request = RegisterDeviceRequest {
            pairing_token: info.token,
            device_name: self.config.device_name.clone(),
            device_type: self.config.device_type.clone(),
            public_key: STANDARD.encode(&keypair.public_key),
        };

        let response = match self.api.register_device(&bridge_url, &request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "device registration failed");
                self.update(|s| {
                    s.step = PairingStep::QrScan;
                    s.error = Some(format!("Registration failed: {e}"));
                });
                return;
            }
        };

        if let Err(e) = self.sessions.save_session(
            &response.device_id,
            &response.session_token,
            &keypair.private_key,
        ) {
            warn!(error = %e, "failed to persist session");
            self.update(|s| {
                s.step = PairingStep::QrScan;
                s.error = Some(format!("Could not save session: {e}"));
            });
            return;
        }

        let requires_approval = response.requires_approval();
        self.update(|s| {
            s.device_id = Some(response.device_id.clone());
            s.session_token = Some(response.session_token.clone());
        });

        if requires_approval {
            info!(device_id = %response.device_id, "registered, awaiting approval");
            self.update(|s| s.step = PairingStep::AwaitingApproval);
            self.start_approval_poll(bridge_url, response.device_id, response.session_token);
        } else {
            info!(device_id = %response.device_id, "registered and pre-approved");
            self.update(|s| {
                s.step = PairingStep::Complete;
                s.message = Some("Device paired successfully".into());
            });
        }
    }

    /// Starts the approval poll, replacing any previous one. At most one
    /// poll runs at a time; a cancelled poll never touches state again.
    fn start_approval_poll(&self, bridge_url: String, device_id: String, session_token: String) {
        self.cancel_poll();
        let cancel = CancellationToken::new();
        if let Ok(mut guard) = self.poll_cancel.lock() {
            *guard = Some(cancel.clone());
        }

        let api = self.api.clone();
        let state_tx = self.state_tx.clone();
        let poll_interval = self.config.poll_interval;
        let call_timeout = self.config.poll_call_timeout;
        let max_attempts = self.config.max_poll_attempts;

        tokio::spawn(async move {
            for attempt in 1..=max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                let call = api.wait_for_approval(
                    &bridge_url,
                    &device_id,
                    &session_token,
                    call_timeout.as_secs(),
                );
                let result = tokio::select! {
                    _ = cancel.cancelled() => return,
                    r = tokio::time::timeout(call_timeout + POLL_CALL_MARGIN, call) => r,
                };
                if cancel.is_cancelled() {
                    return;
                }

                match result {
                    Ok(Ok(approval)) => match approval.status.as_str() {
                        "approved" => {
                            info!(device_id = %device_id, "device approved");
                            settle(&state_tx, &cancel, |s| {
                                s.step = PairingStep::Complete;
                                s.message = Some("Device paired successfully".into());
                                s.error = None;
                            });
                            return;
                        }
                        "rejected" => {
                            let reason = approval
                                .rejection_reason
                                .unwrap_or_else(|| "Device was rejected".into());
                            warn!(device_id = %device_id, %reason, "device rejected");
                            settle(&state_tx, &cancel, |s| {
                                s.step = PairingStep::Error;
                                s.error = Some(reason);
                            });
                            return;
                        }
                        "expired" => {
                            settle(&state_tx, &cancel, |s| {
                                s.step = PairingStep::Error;
                                s.error = Some("Approval request expired".into());
                            });
                            return;
                        }
                        other => {
                            debug!(attempt, status = other, "approval still pending");
                        }
                    },
                    Ok(Err(e)) => {
                        // Transient — the next attempt may succeed.
                        debug!(attempt, error = %e, "approval check failed");
                    }
                    Err(_) => {
                        debug!(attempt, "approval check timed out");
                    }
                }
            }

            settle(&state_tx, &cancel, |s| {
                s.step = PairingStep::Error;
                s.error = Some("Approval timeout - please try again".into());
            });
        });
    }

    fn cancel_poll(&self) {
        if let Ok(mut guard) = self.poll_cancel.lock()
            && let Some(token) = guard.take()
        {
            token.cancel();
        }
    }
}

impl Drop for PairingCoordinator {
    fn drop(&mut self) {
        self.cancel_poll();
        self.stop_bridge_watch();
    }
}

/// Applies a terminal poll outcome unless the poll was cancelled. The check
/// runs under the watch write lock, so a concurrent cancellation either
/// suppresses the write or its reset lands after it; a cancelled poll can
/// never be the last writer.
fn settle(
    state_tx: &watch::Sender<PairingState>,
    cancel: &CancellationToken,
    f: impl FnOnce(&mut PairingState),
) {
    state_tx.send_if_modified(|s| {
        if cancel.is_cancelled() {
            return false;
        }
        f(s);
        true
    });
}
