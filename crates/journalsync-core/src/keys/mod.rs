//! Key lifecycle management
//!
//! | Key | Algorithm | Persisted as |
//! |-----|-----------|--------------|
//! | Device keypair | X25519 | JSON `{version, publicKey, secretKey}` via [`DeviceKeyStore`] |
//! | Content key | 32 random bytes | sealed box to the device public key via [`WrappedContentKeyStore`] |
//!
//! The content key encrypts every journal payload. Each device keeps its own
//! sealed copy, so the plaintext key only ever exists in memory inside a
//! [`KeySession`].

mod device;
pub mod sealed;
mod session;
mod store;

pub use device::{fingerprint_of, parse_public_key, ContentKey, DeviceKeyMaterial, KEY_FORMAT_VERSION};
pub use session::{seal_content_key_for, unseal_content_key, KeySession};
pub use store::{
    DeviceKeyStore, MemoryKeyStore, WrappedContentKeyStore, CONTENT_KEY_STORAGE_KEY,
    DEVICE_KEY_STORAGE_KEY,
};
