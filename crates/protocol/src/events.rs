//! Inbound event decoding.
//!
//! Each inbound text frame carries a `type` discriminator and a `payload`
//! object. Classification reads the discriminator only — payload content is
//! never inspected before a variant has been selected, so a chat message
//! containing the literal string `"device.approved"` cannot be misrouted.
//!
//! Decoding is total: malformed JSON, unrecognized types and recognized
//! types with unusable payloads all become [`InboundEvent::Unknown`].

use serde::Deserialize;

/// An event decoded from an inbound Bridge frame. Exactly one per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    DeviceApproved {
        device_id: String,
    },
    DeviceRejected {
        device_id: String,
        reason: String,
    },
    NewMessage {
        room_id: String,
        message_id: String,
        sender: String,
        content: String,
    },
    WorkflowUpdate {
        workflow_id: String,
        step_id: String,
        status: String,
        progress: f64,
    },
    Pong {
        timestamp: i64,
    },
    /// Anything that could not be decoded, carrying the original frame.
    Unknown {
        raw: String,
    },
}

/// Envelope with the payload left raw until the discriminator is known.
#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(borrow)]
    payload: Option<&'a serde_json::value::RawValue>,
}

#[derive(Deserialize)]
struct ApprovedPayload {
    device_id: String,
}

#[derive(Deserialize)]
struct RejectedPayload {
    device_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct MessagePayload {
    room_id: String,
    message_id: String,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct WorkflowPayload {
    workflow_id: String,
    step_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: f64,
}

#[derive(Deserialize)]
struct PongPayload {
    #[serde(default)]
    timestamp: i64,
}

impl InboundEvent {
    /// Decodes a raw text frame. Never fails.
    pub fn decode(raw: &str) -> InboundEvent {
        let Ok(envelope) = serde_json::from_str::<Envelope>(raw) else {
            return InboundEvent::Unknown { raw: raw.into() };
        };

        let payload = envelope.payload.map(|r| r.get()).unwrap_or("{}");

        match envelope.kind.as_str() {
            "device.approved" => serde_json::from_str::<ApprovedPayload>(payload)
                .map(|p| InboundEvent::DeviceApproved {
                    device_id: p.device_id,
                })
                .unwrap_or_else(|_| InboundEvent::Unknown { raw: raw.into() }),
            "device.rejected" => serde_json::from_str::<RejectedPayload>(payload)
                .map(|p| InboundEvent::DeviceRejected {
                    device_id: p.device_id,
                    reason: p.reason,
                })
                .unwrap_or_else(|_| InboundEvent::Unknown { raw: raw.into() }),
            "message.new" => serde_json::from_str::<MessagePayload>(payload)
                .map(|p| InboundEvent::NewMessage {
                    room_id: p.room_id,
                    message_id: p.message_id,
                    sender: p.sender,
                    content: p.content,
                })
                .unwrap_or_else(|_| InboundEvent::Unknown { raw: raw.into() }),
            "workflow.update" => serde_json::from_str::<WorkflowPayload>(payload)
                .map(|p| InboundEvent::WorkflowUpdate {
                    workflow_id: p.workflow_id,
                    step_id: p.step_id,
                    status: p.status,
                    progress: p.progress,
                })
                .unwrap_or_else(|_| InboundEvent::Unknown { raw: raw.into() }),
            "pong" => serde_json::from_str::<PongPayload>(payload)
                .map(|p| InboundEvent::Pong {
                    timestamp: p.timestamp,
                })
                .unwrap_or_else(|_| InboundEvent::Unknown { raw: raw.into() }),
            _ => InboundEvent::Unknown { raw: raw.into() },
        }
    }
}
