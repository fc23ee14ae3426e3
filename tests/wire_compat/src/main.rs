fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use armorlink_protocol::{InboundEvent, OutboundFrame, PairingInfo};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file as raw text.
    fn load_raw(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_raw(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The Go bridge serializes `float64(50)` as `50`, Rust serializes
    /// `f64` as `50.0`. Both are semantically identical.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        let norm_fixture = normalize_value(&fixture);
        let norm_reserialized = normalize_value(&reserialized);
        assert_eq!(
            norm_fixture, norm_reserialized,
            "roundtrip mismatch for {name}:\n  bridge: {fixture}\n  rust:   {reserialized}"
        );
    }

    // --- Outbound control frames ---

    #[test]
    fn fixture_outbound_register() {
        roundtrip_test::<OutboundFrame>("outbound_register.json");
    }

    #[test]
    fn fixture_outbound_ping() {
        roundtrip_test::<OutboundFrame>("outbound_ping.json");
    }

    #[test]
    fn fixture_outbound_rpc() {
        roundtrip_test::<OutboundFrame>("outbound_rpc.json");
    }

    // --- Inbound event frames (decoded, never roundtripped: decode is
    // total and collapses unknown shapes into `Unknown`) ---

    #[test]
    fn fixture_inbound_device_approved() {
        let event = InboundEvent::decode(&load_raw("inbound_device_approved.json"));
        assert!(matches!(
            event,
            InboundEvent::DeviceApproved { device_id } if device_id == "dev-4f2a"
        ));
    }

    #[test]
    fn fixture_inbound_device_rejected() {
        let event = InboundEvent::decode(&load_raw("inbound_device_rejected.json"));
        match event {
            InboundEvent::DeviceRejected { device_id, reason } => {
                assert_eq!(device_id, "dev-4f2a");
                assert_eq!(reason, "not recognized by admin");
            }
            other => panic!("expected DeviceRejected, got {other:?}"),
        }
    }

    #[test]
    fn fixture_inbound_message_new() {
        let event = InboundEvent::decode(&load_raw("inbound_message_new.json"));
        match event {
            InboundEvent::NewMessage {
                room_id,
                message_id,
                sender,
                content,
            } => {
                assert_eq!(room_id, "!ops:bridge.local");
                assert_eq!(message_id, "$m1");
                assert_eq!(sender, "@admin:bridge.local");
                // Payload content containing a discriminator literal must
                // not be misrouted.
                assert!(content.contains("device.approved"));
            }
            other => panic!("expected NewMessage, got {other:?}"),
        }
    }

    #[test]
    fn fixture_inbound_workflow_update() {
        let event = InboundEvent::decode(&load_raw("inbound_workflow_update.json"));
        match event {
            InboundEvent::WorkflowUpdate {
                workflow_id,
                step_id,
                status,
                progress,
            } => {
                assert_eq!(workflow_id, "wf-7");
                assert_eq!(step_id, "build");
                assert_eq!(status, "running");
                assert!((progress - 62.5).abs() < f64::EPSILON);
            }
            other => panic!("expected WorkflowUpdate, got {other:?}"),
        }
    }

    #[test]
    fn fixture_inbound_pong() {
        let event = InboundEvent::decode(&load_raw("inbound_pong.json"));
        assert!(matches!(
            event,
            InboundEvent::Pong { timestamp } if timestamp == 1_725_000_000
        ));
    }

    #[test]
    fn fixture_inbound_unrecognized_type_is_unknown() {
        let event = InboundEvent::decode(&load_raw("inbound_unrecognized.json"));
        assert!(matches!(event, InboundEvent::Unknown { .. }));
    }

    // --- Bridge API responses (parsed from the bridge's result shapes;
    // extra fields the client ignores make these one-way) ---

    #[test]
    fn fixture_register_device_response() {
        let fixture = load_fixture("register_device_response.json");
        let resp: armorlink_bridge_api::RegisterDeviceResponse =
            serde_json::from_value(fixture).unwrap();
        assert_eq!(resp.device_id, "dev-4f2a");
        assert_eq!(resp.session_token, "dev-4f2a_s1");
        assert!(resp.requires_approval());
    }

    #[test]
    fn fixture_approval_response_rejected() {
        let fixture = load_fixture("approval_response_rejected.json");
        let resp: armorlink_bridge_api::ApprovalResponse =
            serde_json::from_value(fixture).unwrap();
        assert_eq!(resp.status, "rejected");
        assert_eq!(resp.rejection_reason.as_deref(), Some("unknown device"));
    }

    // --- Pairing payloads ---

    #[test]
    fn fixture_pairing_info() {
        roundtrip_test::<PairingInfo>("pairing_info.json");
    }

    #[test]
    fn fixture_qr_deep_link() {
        let fixture = load_fixture("qr_deep_link.json");
        let payload = fixture["payload"].as_str().unwrap();
        let info = armorlink_protocol::parse_qr_payload(payload).unwrap();
        assert_eq!(info.token, fixture["expected"]["token"].as_str().unwrap());
        assert_eq!(info.server, fixture["expected"]["server"].as_str().unwrap());
    }

    // --- Discovery ---

    #[test]
    fn fixture_discovered_bridge() {
        roundtrip_test::<armorlink_discovery::DiscoveredBridge>("discovered_bridge.json");
    }
}
