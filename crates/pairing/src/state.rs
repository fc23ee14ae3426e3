//! Observable pairing state.

use armorlink_discovery::types::DiscoveredBridge;
use armorlink_protocol::PairingInfo;

/// Current step of the pairing flow.
///
/// Advances forward along BridgeSelect → CertificateVerify → QrScan →
/// DeviceRegistration → AwaitingApproval → Complete, with explicit
/// regressions on rejection or cancellation and a terminal `Error` step
/// that [`retry`](crate::PairingCoordinator::retry) recovers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStep {
    BridgeSelect,
    CertificateVerify,
    QrScan,
    DeviceRegistration,
    AwaitingApproval,
    Complete,
    Error,
}

/// Snapshot of the pairing flow, published on every change.
#[derive(Debug, Clone)]
pub struct PairingState {
    pub step: PairingStep,
    pub discovered_bridges: Vec<DiscoveredBridge>,
    pub selected_bridge: Option<DiscoveredBridge>,
    pub certificate_fingerprint: Option<String>,
    pub pairing_info: Option<PairingInfo>,
    pub device_id: Option<String>,
    pub session_token: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
    /// True while a discovery pass is running.
    pub discovering: bool,
}

impl PairingState {
    /// A fresh snapshot at the BridgeSelect step with everything cleared.
    pub fn new() -> Self {
        Self {
            step: PairingStep::BridgeSelect,
            discovered_bridges: Vec::new(),
            selected_bridge: None,
            certificate_fingerprint: None,
            pairing_info: None,
            device_id: None,
            session_token: None,
            error: None,
            message: None,
            discovering: false,
        }
    }
}

impl Default for PairingState {
    fn default() -> Self {
        Self::new()
    }
}
