//! Outbound control frames sent from the device to the Bridge.
//!
//! All frames are JSON text with a `type` discriminator, matching the Go
//! bridge's WebSocket handler.

use serde::{Deserialize, Serialize};

/// Payload of the initial registration frame sent after every connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub device_id: String,
}

/// Payload of an RPC frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcPayload {
    pub method: String,
    pub id: u64,
    pub params: serde_json::Value,
}

/// A control frame sent to the Bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// `{"type":"register","payload":{"device_id":"..."}}`
    Register { payload: RegisterPayload },
    /// `{"type":"ping"}` — application-level heartbeat.
    Ping,
    /// `{"type":"rpc","payload":{"method":...,"id":...,"params":...}}`
    Rpc { payload: RpcPayload },
}

impl OutboundFrame {
    /// Builds the registration frame for a device.
    pub fn register(device_id: impl Into<String>) -> Self {
        Self::Register {
            payload: RegisterPayload {
                device_id: device_id.into(),
            },
        }
    }

    /// Builds a heartbeat frame.
    pub fn ping() -> Self {
        Self::Ping
    }

    /// Builds an RPC frame.
    pub fn rpc(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self::Rpc {
            payload: RpcPayload {
                method: method.into(),
                id,
                params,
            },
        }
    }

    /// Serializes the frame to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
