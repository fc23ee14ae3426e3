//! reqwest-backed implementation of [`BridgeApi`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use armorlink_protocol::constants::{FINGERPRINT_PATH, RPC_PATH};

use crate::types::{ApprovalResponse, RegisterDeviceRequest, RegisterDeviceResponse};
use crate::{ApiError, BridgeApi};

/// Default timeout for ordinary API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra slack on top of the bridge-side `timeout` param so the HTTP
/// request doesn't abort before the bridge answers.
const WAIT_TIMEOUT_MARGIN: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct FingerprintResponse {
    sha256: String,
}

#[derive(Deserialize)]
struct RpcErrorObj {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObj>,
}

/// HTTP client for the Bridge registration API.
///
/// Bridges serve self-signed certificates; trust is established by the
/// user confirming the certificate fingerprint, so invalid certs are
/// accepted at the HTTP layer.
pub struct HttpBridgeApi {
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpBridgeApi {
    pub fn new() -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Issues a JSON-RPC 2.0 call against `{bridge_url}/api`.
    async fn rpc_call<T: DeserializeOwned>(
        &self,
        bridge_url: &str,
        method: &str,
        params: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, ApiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let url = format!("{}{RPC_PATH}", bridge_url.trim_end_matches('/'));
        debug!(%url, method, id, "bridge rpc call");

        let mut request = self.http.post(&url).json(&body);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response: RpcResponse<T> = request.send().await?.json().await?;

        if let Some(err) = response.error {
            return Err(ApiError::Bridge {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| ApiError::UnexpectedResponse(format!("{method}: empty result")))
    }
}

#[async_trait]
impl BridgeApi for HttpBridgeApi {
    async fn get_certificate_fingerprint(&self, bridge_url: &str) -> Result<String, ApiError> {
        let url = format!("{}{FINGERPRINT_PATH}", bridge_url.trim_end_matches('/'));
        let resp: FingerprintResponse = self.http.get(&url).send().await?.json().await?;
        if resp.sha256.is_empty() {
            return Err(ApiError::UnexpectedResponse(
                "empty certificate fingerprint".into(),
            ));
        }
        Ok(resp.sha256)
    }

    async fn register_device(
        &self,
        bridge_url: &str,
        request: &RegisterDeviceRequest,
    ) -> Result<RegisterDeviceResponse, ApiError> {
        let params = serde_json::to_value(request)?;
        self.rpc_call(bridge_url, "device.register", params, None)
            .await
    }

    async fn wait_for_approval(
        &self,
        bridge_url: &str,
        device_id: &str,
        session_token: &str,
        timeout_secs: u64,
    ) -> Result<ApprovalResponse, ApiError> {
        let params = serde_json::json!({
            "device_id": device_id,
            "session_token": session_token,
            "timeout": timeout_secs,
        });
        let timeout = Duration::from_secs(timeout_secs) + WAIT_TIMEOUT_MARGIN;
        self.rpc_call(bridge_url, "device.wait_for_approval", params, Some(timeout))
            .await
    }
}
