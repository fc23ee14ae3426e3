//! Persistent session credentials for a paired device.
//!
//! The session is cached in memory and persisted to a JSON file.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid key encoding: {0}")]
    Key(#[from] base64::DecodeError),
}

/// Credentials issued by the Bridge at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub device_id: String,
    pub session_token: String,
    /// Base64-encoded device private key.
    pub private_key: String,
}

impl SavedSession {
    /// Decodes the stored private key back into raw bytes.
    pub fn private_key_bytes(&self) -> Result<Vec<u8>, SessionError> {
        Ok(STANDARD.decode(&self.private_key)?)
    }
}

/// Stores the device's pairing session on disk.
pub struct SessionStore {
    path: PathBuf,
    cached: RwLock<Option<SavedSession>>,
}

impl SessionStore {
    /// Creates a session store, loading an existing session from disk.
    pub fn new(path: PathBuf) -> Result<Self, SessionError> {
        let cached = load_session(&path)?;
        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    /// Returns the saved session, if the device is paired.
    pub fn get_session(&self) -> Option<SavedSession> {
        self.cached.read().ok().and_then(|s| s.clone())
    }

    /// Persists new session credentials, replacing any previous session.
    pub fn save_session(
        &self,
        device_id: &str,
        session_token: &str,
        private_key: &[u8],
    ) -> Result<(), SessionError> {
        let session = SavedSession {
            device_id: device_id.to_string(),
            session_token: session_token.to_string(),
            private_key: STANDARD.encode(private_key),
        };

        let json = serde_json::to_string_pretty(&session)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!(device_id, "persisted session to {:?}", self.path);

        if let Ok(mut cache) = self.cached.write() {
            *cache = Some(session);
        }
        Ok(())
    }

    /// Removes the saved session from memory and disk.
    pub fn clear_session(&self) -> Result<(), SessionError> {
        if let Ok(mut cache) = self.cached.write() {
            *cache = None;
        }
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!("removed session file {:?}", self.path);
        }
        Ok(())
    }
}

fn load_session(path: &Path) -> Result<Option<SavedSession>, SessionError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let session: SavedSession = serde_json::from_str(&data)?;
    debug!(device_id = %session.device_id, "loaded session from {path:?}");
    Ok(Some(session))
}

/// Returns the default session file path.
pub fn default_session_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("armorclaw").join("session.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, SessionStore) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.json");
        let store = SessionStore::new(path).unwrap();
        (tmp, store)
    }

    #[test]
    fn new_store_has_no_session() {
        let (_tmp, store) = test_store();
        assert!(store.get_session().is_none());
    }

    #[test]
    fn save_and_get_session() {
        let (_tmp, store) = test_store();
        store.save_session("dev-1", "tok-1", b"secret-key").unwrap();

        let session = store.get_session().unwrap();
        assert_eq!(session.device_id, "dev-1");
        assert_eq!(session.session_token, "tok-1");
        assert_eq!(session.private_key_bytes().unwrap(), b"secret-key");
    }

    #[test]
    fn save_replaces_previous_session() {
        let (_tmp, store) = test_store();
        store.save_session("dev-1", "old", b"k1").unwrap();
        store.save_session("dev-2", "new", b"k2").unwrap();

        let session = store.get_session().unwrap();
        assert_eq!(session.device_id, "dev-2");
        assert_eq!(session.session_token, "new");
    }

    #[test]
    fn clear_session_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.json");
        let store = SessionStore::new(path.clone()).unwrap();

        store.save_session("dev-1", "tok", b"key").unwrap();
        assert!(path.exists());

        store.clear_session().unwrap();
        assert!(store.get_session().is_none());
        assert!(!path.exists());

        // Idempotent.
        store.clear_session().unwrap();
    }

    #[test]
    fn persist_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.json");

        {
            let store = SessionStore::new(path.clone()).unwrap();
            store.save_session("dev-9", "tok-9", b"key-9").unwrap();
        }

        let store2 = SessionStore::new(path).unwrap();
        let session = store2.get_session().unwrap();
        assert_eq!(session.device_id, "dev-9");
        assert_eq!(session.private_key_bytes().unwrap(), b"key-9");
    }

    #[test]
    fn load_missing_file_returns_none() {
        let path = PathBuf::from("/tmp/nonexistent_armorlink_test_session.json");
        assert!(load_session(&path).unwrap().is_none());
    }
}
