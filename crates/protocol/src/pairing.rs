//! Pairing payload parsing.
//!
//! A pairing payload arrives either from a scanned QR code or from a
//! manually entered token. QR payloads come in several historical shapes,
//! tried in order (first match wins):
//!
//! 1. `armorclaw://pair/...` deep link — query form (`?token=...&server=...`)
//!    or URL-safe base64 of the JSON object form.
//! 2. Raw JSON object (`{"token": ...}`).
//! 3. Standard base64 of the JSON object form.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TOKEN_TTL, QR_URI_PREFIX};

/// Credentials extracted from a pairing payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingInfo {
    pub token: String,
    pub server: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl PairingInfo {
    /// Builds pairing info from a bare token, with the default expiry.
    pub fn from_token(token: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            server: server.into(),
            user_id: String::new(),
            expires_at: default_expiry(),
        }
    }

    /// Returns `true` if the token's validity window has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Errors from pairing payload parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QrParseError {
    #[error("missing pairing token")]
    MissingToken,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("Unknown QR code format")]
    UnknownFormat,
}

fn default_expiry() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(DEFAULT_TOKEN_TTL).unwrap_or_default()
}

/// Parses a pairing payload through the ordered fallback chain.
///
/// Deterministic: the same input always yields the same `PairingInfo`
/// (modulo the default expiry clock) or the same error.
pub fn parse_qr_payload(data: &str) -> Result<PairingInfo, QrParseError> {
    let data = data.trim();

    if let Some(rest) = data.strip_prefix(QR_URI_PREFIX) {
        let rest = rest.trim_start_matches('/');
        if let Some(idx) = rest.find('?') {
            return Ok(parse_query(&rest[idx + 1..]));
        }
        let decoded = decode_base64(rest, &[&URL_SAFE_NO_PAD, &URL_SAFE])
            .ok_or_else(|| QrParseError::Malformed("invalid base64 in deep link".into()))?;
        return parse_json_object(&decoded);
    }

    if data.starts_with('{') {
        return parse_json_object(data);
    }

    if let Some(decoded) = decode_base64(data, &[&STANDARD, &STANDARD_NO_PAD]) {
        if decoded.trim_start().starts_with('{') {
            return parse_json_object(&decoded);
        }
    }

    Err(QrParseError::UnknownFormat)
}

fn decode_base64(
    data: &str,
    engines: &[&base64::engine::GeneralPurpose],
) -> Option<String> {
    for engine in engines {
        if let Ok(bytes) = engine.decode(data) {
            if let Ok(text) = String::from_utf8(bytes) {
                return Some(text);
            }
        }
    }
    None
}

/// Query form of the deep link. A missing token is tolerated here —
/// registration rejects it later with a clearer message.
fn parse_query(query: &str) -> PairingInfo {
    let mut info = PairingInfo {
        token: String::new(),
        server: String::new(),
        user_id: String::new(),
        expires_at: default_expiry(),
    };

    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "token" => info.token = value.to_string(),
            "server" => info.server = value.to_string(),
            "user" => info.user_id = value.to_string(),
            "expires" => {
                if let Some(ts) = value
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                {
                    info.expires_at = ts;
                }
            }
            _ => {}
        }
    }

    info
}

/// JSON object form: `token` is required, everything else defaults.
fn parse_json_object(text: &str) -> Result<PairingInfo, QrParseError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| QrParseError::Malformed(e.to_string()))?;

    let token = value
        .get("token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or(QrParseError::MissingToken)?
        .to_string();

    let server = value
        .get("server")
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string();

    let user_id = value
        .get("user_id")
        .or_else(|| value.get("userId"))
        .and_then(|u| u.as_str())
        .unwrap_or_default()
        .to_string();

    let expires_at = parse_expires(value.get("expires")).unwrap_or_else(default_expiry);

    Ok(PairingInfo {
        token,
        server,
        user_id,
        expires_at,
    })
}

/// Accepts unix seconds or an RFC 3339 string; anything else falls back
/// to the default expiry.
fn parse_expires(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    match value? {
        serde_json::Value::Number(n) => {
            let secs = n.as_i64()?;
            Utc.timestamp_opt(secs, 0).single()
        }
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
