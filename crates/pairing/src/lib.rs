//! Device pairing with an ArmorClaw Bridge.
//!
//! Drives the pairing handshake end to end: bridge selection (discovered
//! or manual), certificate fingerprint confirmation, QR code or token
//! entry, device registration, and the approval wait. Progress is
//! observable as a stream of [`PairingState`] snapshots.

pub mod coordinator;
pub mod keys;
pub mod locator;
pub mod session;
pub mod state;

pub use coordinator::{PairingConfig, PairingCoordinator};
pub use keys::{DeviceKeyPair, Ed25519KeyService, KeyService};
pub use locator::{BridgeLocator, MdnsBridgeLocator};
pub use session::{SavedSession, SessionError, SessionStore, default_session_path};
pub use state::{PairingState, PairingStep};
