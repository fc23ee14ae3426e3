//! Request and response payloads for the registration RPC methods.
//!
//! Field names match the Go bridge's JSON tags (snake_case).

use serde::{Deserialize, Serialize};

/// Params for `device.register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDeviceRequest {
    pub pairing_token: String,
    pub device_name: String,
    pub device_type: String,
    /// Base64-encoded device public key.
    pub public_key: String,
}

/// Result of `device.register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDeviceResponse {
    pub device_id: String,
    pub session_token: String,
    #[serde(default)]
    pub next_step: String,
}

impl RegisterDeviceResponse {
    /// Whether the bridge requires an out-of-band admin approval before
    /// the session becomes usable.
    pub fn requires_approval(&self) -> bool {
        self.next_step == "awaiting_approval"
    }
}

/// Result of `device.wait_for_approval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_wire_shape() {
        let req = RegisterDeviceRequest {
            pairing_token: "tok".into(),
            device_name: "Pixel 8".into(),
            device_type: "linux".into(),
            public_key: "cGs=".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["pairing_token"], "tok");
        assert_eq!(v["device_name"], "Pixel 8");
        assert_eq!(v["public_key"], "cGs=");
    }

    #[test]
    fn register_response_parses_bridge_result() {
        // Shape emitted by the Go bridge's handleDeviceRegister.
        let json = r#"{
            "device_id": "dev-1",
            "device_name": "Pixel 8",
            "trust_state": "pending_approval",
            "session_token": "dev-1_s1",
            "next_step": "awaiting_approval"
        }"#;
        let resp: RegisterDeviceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.device_id, "dev-1");
        assert!(resp.requires_approval());
    }

    #[test]
    fn register_response_without_next_step_is_preapproved() {
        let json = r#"{"device_id":"dev-2","session_token":"t"}"#;
        let resp: RegisterDeviceResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.requires_approval());
    }

    #[test]
    fn approval_response_parses_rejection() {
        let json = r#"{"status":"rejected","rejection_reason":"unknown device"}"#;
        let resp: ApprovalResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "rejected");
        assert_eq!(resp.rejection_reason.as_deref(), Some("unknown device"));
    }

    #[test]
    fn approval_response_pending_has_no_reason() {
        let json = r#"{"status":"pending","message":"Connect to WebSocket"}"#;
        let resp: ApprovalResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "pending");
        assert!(resp.rejection_reason.is_none());
    }
}
