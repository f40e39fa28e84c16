//! Device keypair and content key types
//!
//! A device owns one X25519 keypair. The secret half never leaves the device;
//! the public half is what the shared content key gets sealed to.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{PayloadCrypto, KEY_SIZE};
use crate::error::SyncError;

/// Version tag written into serialized key documents.
pub const KEY_FORMAT_VERSION: &str = "v1";

/// X25519 keypair identifying one device.
#[derive(Clone)]
pub struct DeviceKeyMaterial {
    secret: StaticSecret,
    public: PublicKey,
}

/// On-disk shape of a device keypair.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedDeviceKey {
    version: String,
    public_key: String,
    secret_key: String,
}

impl DeviceKeyMaterial {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self::from_secret_bytes(PayloadCrypto::generate_key())
    }

    /// Rebuild a keypair from its 32 secret bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public key of this device.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// Public key as standard base64, suitable for sharing with other devices.
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.public.as_bytes())
    }

    /// Short printable fingerprint of the public key.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.public)
    }

    /// Serialize to the versioned JSON document persisted by a key store.
    pub fn to_serialized(&self) -> Result<String, SyncError> {
        let doc = SerializedDeviceKey {
            version: KEY_FORMAT_VERSION.to_string(),
            public_key: STANDARD.encode(self.public.as_bytes()),
            secret_key: STANDARD.encode(self.secret.to_bytes()),
        };
        serde_json::to_string(&doc)
            .map_err(|e| SyncError::Serialization(format!("Failed to encode device key: {}", e)))
    }

    /// Parse a document written by [`DeviceKeyMaterial::to_serialized`].
    ///
    /// Rejects documents whose public key does not belong to the secret key.
    pub fn from_serialized(serialized: &str) -> Result<Self, SyncError> {
        let doc: SerializedDeviceKey = serde_json::from_str(serialized)
            .map_err(|_| SyncError::InvalidKeyMaterial("device key is not valid JSON".into()))?;
        if doc.version != KEY_FORMAT_VERSION {
            return Err(SyncError::InvalidKeyMaterial(format!(
                "unknown device key version {}",
                doc.version
            )));
        }

        let mut secret = decode_key_bytes(&doc.secret_key, "secret key")?;
        let public = decode_key_bytes(&doc.public_key, "public key")?;

        let material = Self::from_secret_bytes(secret);
        secret.zeroize();

        if material.public.as_bytes() != &public {
            return Err(SyncError::InvalidKeyMaterial(
                "public key does not match secret key".into(),
            ));
        }
        Ok(material)
    }
}

impl std::fmt::Debug for DeviceKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceKeyMaterial")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

impl PartialEq for DeviceKeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public && self.secret.to_bytes() == other.secret.to_bytes()
    }
}

/// Fingerprint (first 16 hex chars of BLAKE3) of an X25519 public key.
pub fn fingerprint_of(public: &PublicKey) -> String {
    blake3::hash(public.as_bytes()).to_hex()[..16].to_string()
}

/// Parse a base64 public key shared by another device.
pub fn parse_public_key(encoded: &str) -> Result<PublicKey, SyncError> {
    Ok(PublicKey::from(decode_key_bytes(encoded, "public key")?))
}

fn decode_key_bytes(encoded: &str, what: &str) -> Result<[u8; 32], SyncError> {
    let mut bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| SyncError::InvalidKeyMaterial(format!("{} is not valid base64", what)))?;
    let result: Result<[u8; 32], _> = bytes.as_slice().try_into();
    bytes.zeroize();
    result.map_err(|_| SyncError::InvalidKeyMaterial(format!("{} must be 32 bytes", what)))
}

/// The symmetric key that encrypts all journal payloads.
///
/// Zeroized on drop and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Generate a new random content key.
    pub fn generate() -> Self {
        Self(PayloadCrypto::generate_key())
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub(crate) fn from_slice(bytes: &[u8]) -> Result<Self, SyncError> {
        let arr: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| SyncError::InvalidKeyMaterial("content key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(..)")
    }
}
