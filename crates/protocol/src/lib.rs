//! Wire protocol types for device-Bridge communication.
//!
//! Covers the outbound control frames, the inbound event decoder, and the
//! pairing-payload (QR / deep link) parsing chain.

pub mod constants;
pub mod events;
pub mod frames;
pub mod pairing;

pub use constants::{QR_URI_PREFIX, SERVICE_NAME};
pub use events::InboundEvent;
pub use frames::{OutboundFrame, RegisterPayload, RpcPayload};
pub use pairing::{PairingInfo, QrParseError, parse_qr_payload};
