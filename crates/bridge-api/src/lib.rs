//! HTTP collaborator for the Bridge's registration API.
//!
//! The Bridge exposes a plain `GET /fingerprint` endpoint and a JSON-RPC 2.0
//! endpoint at `POST /api` carrying the `device.register` and
//! `device.wait_for_approval` methods. Everything here is request-response;
//! the long-lived WebSocket channel lives in `armorlink-connection`.

mod client;
mod types;

pub use client::HttpBridgeApi;
pub use types::{ApprovalResponse, RegisterDeviceRequest, RegisterDeviceResponse};

use async_trait::async_trait;

/// Errors from Bridge API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bridge error {code}: {message}")]
    Bridge { code: i64, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Narrow interface to the Bridge registration API.
///
/// Implemented by [`HttpBridgeApi`] for production and by in-memory mocks
/// in the pairing coordinator's tests.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Fetches the SHA-256 fingerprint of the bridge's TLS certificate.
    async fn get_certificate_fingerprint(&self, bridge_url: &str) -> Result<String, ApiError>;

    /// Registers this device with a pairing token.
    async fn register_device(
        &self,
        bridge_url: &str,
        request: &RegisterDeviceRequest,
    ) -> Result<RegisterDeviceResponse, ApiError>;

    /// Polls the approval status of a registered device. `timeout_secs`
    /// bounds how long the bridge may hold the request open.
    async fn wait_for_approval(
        &self,
        bridge_url: &str,
        device_id: &str,
        session_token: &str,
        timeout_secs: u64,
    ) -> Result<ApprovalResponse, ApiError>;
}
