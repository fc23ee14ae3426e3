//! Device keypair generation.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// Raw key material for a device identity.
pub struct DeviceKeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

/// Generates the keypair presented to the Bridge at registration.
pub trait KeyService: Send + Sync {
    fn generate_keypair(&self) -> DeviceKeyPair;
}

/// Ed25519-backed key service.
pub struct Ed25519KeyService;

impl KeyService for Ed25519KeyService {
    fn generate_keypair(&self) -> DeviceKeyPair {
        let signing = SigningKey::generate(&mut OsRng);
        DeviceKeyPair {
            public_key: signing.verifying_key().to_bytes().to_vec(),
            private_key: signing.to_bytes().to_vec(),
        }
    }
}
