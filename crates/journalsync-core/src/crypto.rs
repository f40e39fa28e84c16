//! Payload encryption using XChaCha20-Poly1305 AEAD
//!
//! Every journal record leaves the device as an encrypted payload sealed with
//! the shared content key. The extended 24-byte nonce is drawn from the
//! system CSPRNG for every message, so devices never have to coordinate nonce
//! counters.
//!
//! # Wire Format
//!
//! ```text
//! +-------------------+---------------+----------------------+
//! | header (4 bytes)  | nonce (24)    | ciphertext + tag (16)|
//! | 0x49 0x56 0x01 00 |               |                      |
//! +-------------------+---------------+----------------------+
//! ```
//!
//! The header is also bound as associated data, so it cannot be swapped
//! without failing authentication.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::SyncError;

/// Format and version marker prefixed to every payload ("IV" + version).
pub const PAYLOAD_HEADER: [u8; 4] = [0x49, 0x56, 0x01, 0x00];

/// Nonce size for XChaCha20-Poly1305 (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Smallest byte length a payload can have before the ciphertext starts.
pub const MIN_PAYLOAD_LEN: usize = PAYLOAD_HEADER.len() + NONCE_SIZE;

/// AEAD cipher bound to one 32-byte key.
///
/// # Example
///
/// ```
/// use journalsync_core::crypto::PayloadCrypto;
///
/// let key = PayloadCrypto::generate_key();
/// let crypto = PayloadCrypto::new(&key);
///
/// let payload = crypto.encrypt(b"dear diary").unwrap();
/// assert_eq!(crypto.decrypt(&payload).unwrap(), b"dear diary");
/// ```
pub struct PayloadCrypto {
    cipher: XChaCha20Poly1305,
}

impl PayloadCrypto {
    /// Create a new cipher instance with the given 32-byte key.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.into()),
        }
    }

    /// Generate a new random 32-byte key.
    pub fn generate_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut key);
        key
    }

    /// Generate a random 24-byte nonce.
    pub fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);
        nonce
    }

    /// Encrypt binary data.
    ///
    /// The output format is: `[header (4)] + [nonce (24)] + [ciphertext + tag]`
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SyncError> {
        let nonce_bytes = Self::generate_nonce();
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: data,
                    aad: &PAYLOAD_HEADER,
                },
            )
            .map_err(|e| SyncError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut packed = Vec::with_capacity(MIN_PAYLOAD_LEN + ciphertext.len());
        packed.extend_from_slice(&PAYLOAD_HEADER);
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&ciphertext);
        Ok(packed)
    }

    /// Decrypt a payload produced by [`PayloadCrypto::encrypt`].
    ///
    /// Fails with [`SyncError::DecryptionFailed`] on a short payload, a header
    /// mismatch, a wrong key or any tampering.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, SyncError> {
        if payload.len() < MIN_PAYLOAD_LEN {
            return Err(SyncError::DecryptionFailed(
                "Invalid payload length".to_string(),
            ));
        }
        if payload[..PAYLOAD_HEADER.len()] != PAYLOAD_HEADER {
            return Err(SyncError::DecryptionFailed(
                "Invalid payload header".to_string(),
            ));
        }

        let nonce = XNonce::from_slice(&payload[PAYLOAD_HEADER.len()..MIN_PAYLOAD_LEN]);
        let ciphertext = &payload[MIN_PAYLOAD_LEN..];

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: &PAYLOAD_HEADER,
                },
            )
            .map_err(|_| SyncError::DecryptionFailed("Failed to decrypt payload".to_string()))
    }

    /// Serialize a value to JSON and encrypt it.
    pub fn encrypt_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SyncError> {
        let json = serde_json::to_vec(value)
            .map_err(|e| SyncError::Serialization(format!("Failed to encode JSON: {}", e)))?;
        self.encrypt(&json)
    }

    /// Decrypt a payload and parse the plaintext as JSON.
    pub fn decrypt_json<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, SyncError> {
        let plaintext = self.decrypt(payload)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| SyncError::Serialization(format!("Failed to decode JSON: {}", e)))
    }
}

/// Encrypt binary data with a one-off cipher instance.
pub fn encrypt_binary(data: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>, SyncError> {
    PayloadCrypto::new(key).encrypt(data)
}

/// Decrypt a payload with a one-off cipher instance.
pub fn decrypt_binary(payload: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>, SyncError> {
    PayloadCrypto::new(key).decrypt(payload)
}

/// Encrypt a JSON-serializable value.
pub fn encrypt_json<T: Serialize + ?Sized>(
    value: &T,
    key: &[u8; KEY_SIZE],
) -> Result<Vec<u8>, SyncError> {
    PayloadCrypto::new(key).encrypt_json(value)
}

/// Decrypt a payload into a JSON-deserializable value.
pub fn decrypt_json<T: DeserializeOwned>(
    payload: &[u8],
    key: &[u8; KEY_SIZE],
) -> Result<T, SyncError> {
    PayloadCrypto::new(key).decrypt_json(payload)
}

/// Encrypt a value into base64 text, for storing a single encrypted column.
pub fn encrypt_field<T: Serialize + ?Sized>(
    value: &T,
    key: &[u8; KEY_SIZE],
) -> Result<String, SyncError> {
    Ok(STANDARD.encode(encrypt_json(value, key)?))
}

/// Inverse of [`encrypt_field`].
pub fn decrypt_field<T: DeserializeOwned>(
    encoded: &str,
    key: &[u8; KEY_SIZE],
) -> Result<T, SyncError> {
    let payload = STANDARD
        .decode(encoded)
        .map_err(|_| SyncError::DecryptionFailed("Field is not valid base64".to_string()))?;
    decrypt_json(&payload, key)
}
