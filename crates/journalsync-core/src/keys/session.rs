//! Key session: owns the in-memory key cache
//!
//! A [`KeySession`] is constructed once per account and passed by reference to
//! the push and pull pipelines. Both caches sit behind async mutexes that are
//! held across the store calls, so concurrent first calls establish exactly
//! one device key and one content key.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use x25519_dalek::PublicKey;

use super::device::{ContentKey, DeviceKeyMaterial, KEY_FORMAT_VERSION};
use super::sealed;
use super::store::{DeviceKeyStore, WrappedContentKeyStore};
use crate::error::{SyncError, SyncResult};

/// Persisted shape of a content key sealed to one device.
#[derive(Serialize, Deserialize)]
struct WrappedContentKey {
    version: String,
    sealed: String,
}

/// Seal a content key for a device public key and serialize the result.
///
/// This is also how a key is handed to a second device: seal it to that
/// device's public key and transfer the returned string.
pub fn seal_content_key_for(key: &ContentKey, recipient: &PublicKey) -> SyncResult<String> {
    let sealed = sealed::seal(key.as_bytes(), recipient)?;
    serde_json::to_string(&WrappedContentKey {
        version: KEY_FORMAT_VERSION.to_string(),
        sealed: STANDARD.encode(sealed),
    })
    .map_err(|e| SyncError::Serialization(format!("Failed to encode wrapped key: {}", e)))
}

/// Inverse of [`seal_content_key_for`] using the recipient device's keypair.
pub fn unseal_content_key(serialized: &str, device: &DeviceKeyMaterial) -> SyncResult<ContentKey> {
    let wrapped: WrappedContentKey = serde_json::from_str(serialized.trim())
        .map_err(|_| SyncError::InvalidKeyMaterial("wrapped content key is not valid JSON".into()))?;
    if wrapped.version != KEY_FORMAT_VERSION {
        return Err(SyncError::InvalidKeyMaterial(format!(
            "unknown wrapped key version {}",
            wrapped.version
        )));
    }
    let sealed = STANDARD
        .decode(&wrapped.sealed)
        .map_err(|_| SyncError::InvalidKeyMaterial("wrapped content key is not base64".into()))?;

    let opened = sealed::open(&sealed, device)?;
    ContentKey::from_slice(&opened)
}

/// Process-lifetime cache of a device keypair and the unwrapped content key.
#[derive(Default)]
pub struct KeySession {
    device: Mutex<Option<Arc<DeviceKeyMaterial>>>,
    content: Mutex<Option<ContentKey>>,
}

impl KeySession {
    /// Create a session with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the device keypair, loading or generating it on first use.
    ///
    /// Unreadable stored material is replaced with a freshly generated
    /// keypair. Store errors are returned unchanged.
    pub async fn ensure_device_key(
        &self,
        store: &dyn DeviceKeyStore,
    ) -> SyncResult<Arc<DeviceKeyMaterial>> {
        let mut cached = self.device.lock().await;
        if let Some(material) = cached.as_ref() {
            return Ok(material.clone());
        }

        if let Some(serialized) = store.load_device_key().await? {
            match DeviceKeyMaterial::from_serialized(&serialized) {
                Ok(material) => {
                    debug!(fingerprint = %material.fingerprint(), "Loaded device key");
                    let material = Arc::new(material);
                    *cached = Some(material.clone());
                    return Ok(material);
                }
                Err(e) => {
                    warn!(error = %e, "Stored device key is unreadable, generating a new one");
                }
            }
        }

        let material = DeviceKeyMaterial::generate();
        store.save_device_key(&material.to_serialized()?).await?;
        info!(fingerprint = %material.fingerprint(), "Generated new device key");

        let material = Arc::new(material);
        *cached = Some(material.clone());
        Ok(material)
    }

    /// Return the content key, unwrapping or generating it on first use.
    ///
    /// When no wrapped key is stored, or it cannot be unsealed with this
    /// device's keypair, a new key is generated, sealed to this device and
    /// persisted, replacing whatever was stored.
    pub async fn ensure_content_key(
        &self,
        content_store: &dyn WrappedContentKeyStore,
        device_store: &dyn DeviceKeyStore,
    ) -> SyncResult<ContentKey> {
        let mut cached = self.content.lock().await;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let device = self.ensure_device_key(device_store).await?;

        if let Some(serialized) = content_store.load_wrapped_content_key().await? {
            match unseal_content_key(&serialized, &device) {
                Ok(key) => {
                    debug!("Unwrapped stored content key");
                    *cached = Some(key.clone());
                    return Ok(key);
                }
                Err(e) => {
                    warn!(error = %e, "Stored content key cannot be unwrapped, generating a new one");
                }
            }
        }

        let key = ContentKey::generate();
        let wrapped = seal_content_key_for(&key, device.public_key())?;
        content_store.save_wrapped_content_key(&wrapped).await?;
        info!(device = %device.fingerprint(), "Generated new content key");

        *cached = Some(key.clone());
        Ok(key)
    }

    /// Adopt a content key shared by another device: seal it to this device,
    /// persist it and cache it.
    pub async fn enroll_content_key(
        &self,
        key: ContentKey,
        content_store: &dyn WrappedContentKeyStore,
        device_store: &dyn DeviceKeyStore,
    ) -> SyncResult<()> {
        let mut cached = self.content.lock().await;
        let device = self.ensure_device_key(device_store).await?;

        let wrapped = seal_content_key_for(&key, device.public_key())?;
        content_store.save_wrapped_content_key(&wrapped).await?;
        info!(device = %device.fingerprint(), "Enrolled shared content key");

        *cached = Some(key);
        Ok(())
    }

    /// Unseal a content key that another device sealed to this device's
    /// public key. Nothing is persisted.
    pub async fn open_shared_content_key(
        &self,
        sealed: &str,
        device_store: &dyn DeviceKeyStore,
    ) -> SyncResult<ContentKey> {
        let device = self.ensure_device_key(device_store).await?;
        unseal_content_key(sealed, &device)
    }

    /// Put an already unwrapped content key into the cache.
    pub async fn cache_content_key(&self, key: ContentKey) {
        *self.content.lock().await = Some(key);
    }

    /// Whether a wrapped content key has been persisted.
    pub async fn has_content_key(
        &self,
        content_store: &dyn WrappedContentKeyStore,
    ) -> SyncResult<bool> {
        Ok(content_store.load_wrapped_content_key().await?.is_some())
    }

    /// Drop both cached keys; the next call reloads from the stores.
    pub async fn clear_cached_keys(&self) {
        *self.content.lock().await = None;
        *self.device.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::store::MemoryKeyStore;
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_device_key_is_generated_once() {
        let store = MemoryKeyStore::new();
        let session = KeySession::new();

        let first = session.ensure_device_key(&store).await.unwrap();
        let second = session.ensure_device_key(&store).await.unwrap();

        assert_eq!(*first, *second);
        assert!(store.device_key().is_some());
    }

    #[tokio::test]
    async fn test_device_key_survives_new_session() {
        let store = MemoryKeyStore::new();

        let first = KeySession::new().ensure_device_key(&store).await.unwrap();
        let second = KeySession::new().ensure_device_key(&store).await.unwrap();

        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn test_corrupt_device_key_is_regenerated() {
        let store = MemoryKeyStore::new();
        store.set_device_key(Some("{broken".to_string()));

        let material = KeySession::new().ensure_device_key(&store).await.unwrap();

        let saved = store.device_key().unwrap();
        assert_ne!(saved, "{broken");
        assert_eq!(
            DeviceKeyMaterial::from_serialized(&saved).unwrap(),
            *material
        );
    }

    #[tokio::test]
    async fn test_content_key_idempotent() {
        let store = MemoryKeyStore::new();
        let session = KeySession::new();

        let k1 = session.ensure_content_key(&store, &store).await.unwrap();
        let k2 = session.ensure_content_key(&store, &store).await.unwrap();
        assert_eq!(k1, k2);

        // A fresh session unwraps the persisted key instead of generating one
        let k3 = KeySession::new()
            .ensure_content_key(&store, &store)
            .await
            .unwrap();
        assert_eq!(k1, k3);
    }

    #[tokio::test]
    async fn test_unwrappable_content_key_is_replaced() {
        let store = MemoryKeyStore::new();
        let k1 = KeySession::new()
            .ensure_content_key(&store, &store)
            .await
            .unwrap();

        // Device re-enrolled: new device key, old wrap no longer opens
        store.set_device_key(None);
        let k2 = KeySession::new()
            .ensure_content_key(&store, &store)
            .await
            .unwrap();

        assert_ne!(k1, k2);
    }

    #[tokio::test]
    async fn test_clear_cached_keys() {
        let store = MemoryKeyStore::new();
        let session = KeySession::new();
        let k1 = session.ensure_content_key(&store, &store).await.unwrap();

        session.clear_cached_keys().await;
        store.set_wrapped_content_key(None);

        let k2 = session.ensure_content_key(&store, &store).await.unwrap();
        assert_ne!(k1, k2);
    }

    #[tokio::test]
    async fn test_enroll_shared_key_on_second_device() {
        let store_a = MemoryKeyStore::new();
        let store_b = MemoryKeyStore::new();
        let session_a = KeySession::new();
        let session_b = KeySession::new();

        let key = session_a.ensure_content_key(&store_a, &store_a).await.unwrap();
        let device_b = session_b.ensure_device_key(&store_b).await.unwrap();

        // A seals the key to B, B opens and enrolls it
        let handoff = seal_content_key_for(&key, device_b.public_key()).unwrap();
        let opened = session_b
            .open_shared_content_key(&handoff, &store_b)
            .await
            .unwrap();
        session_b
            .enroll_content_key(opened, &store_b, &store_b)
            .await
            .unwrap();

        let fresh_b = KeySession::new()
            .ensure_content_key(&store_b, &store_b)
            .await
            .unwrap();
        assert_eq!(fresh_b, key);
        assert!(session_b.has_content_key(&store_b).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_generates_one_key() {
        let store = MemoryKeyStore::new();
        let session = KeySession::new();

        let (a, b) = tokio::join!(
            session.ensure_content_key(&store, &store),
            session.ensure_content_key(&store, &store)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        let persisted = KeySession::new()
            .ensure_content_key(&store, &store)
            .await
            .unwrap();
        assert_eq!(persisted, session.ensure_content_key(&store, &store).await.unwrap());
    }

    struct FailingStore;

    #[async_trait]
    impl DeviceKeyStore for FailingStore {
        async fn load_device_key(&self) -> SyncResult<Option<String>> {
            Err(SyncError::Storage("keychain locked".to_string()))
        }

        async fn save_device_key(&self, _serialized: &str) -> SyncResult<()> {
            Err(SyncError::Storage("keychain locked".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let session = KeySession::new();
        let result = session.ensure_device_key(&FailingStore).await;

        assert!(matches!(result, Err(SyncError::Storage(_))));
    }

    #[test]
    fn test_unseal_rejects_unknown_version() {
        let device = DeviceKeyMaterial::generate();
        let doc = r#"{"version":"v9","sealed":"AAAA"}"#;

        assert!(matches!(
            unseal_content_key(doc, &device),
            Err(SyncError::InvalidKeyMaterial(_))
        ));
    }
}
