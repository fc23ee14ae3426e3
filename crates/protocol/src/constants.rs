//! Shared wire constants.

use std::time::Duration;

/// Custom URI scheme prefix carried by pairing QR codes.
pub const QR_URI_PREFIX: &str = "armorclaw://pair";

/// mDNS service type advertised by Bridges.
pub const SERVICE_NAME: &str = "_armorclaw._tcp";

/// Default validity window for a pairing token when the payload
/// does not carry an explicit expiry.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum accepted size for a single inbound text frame.
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// JSON-RPC path on the Bridge HTTP server.
pub const RPC_PATH: &str = "/api";

/// Certificate fingerprint path on the Bridge HTTP server.
pub const FINGERPRINT_PATH: &str = "/fingerprint";

/// WebSocket path on the Bridge HTTP server.
pub const WS_PATH: &str = "/ws";
