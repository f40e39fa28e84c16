//! Key stores backed by the settings table

use async_trait::async_trait;

use super::Storage;
use crate::error::SyncResult;
use crate::keys::{
    DeviceKeyStore, WrappedContentKeyStore, CONTENT_KEY_STORAGE_KEY, DEVICE_KEY_STORAGE_KEY,
};

#[async_trait]
impl DeviceKeyStore for Storage {
    async fn load_device_key(&self) -> SyncResult<Option<String>> {
        self.get_setting(DEVICE_KEY_STORAGE_KEY)
    }

    async fn save_device_key(&self, serialized: &str) -> SyncResult<()> {
        self.set_setting(DEVICE_KEY_STORAGE_KEY, serialized)
    }
}

#[async_trait]
impl WrappedContentKeyStore for Storage {
    async fn load_wrapped_content_key(&self) -> SyncResult<Option<String>> {
        self.get_setting(CONTENT_KEY_STORAGE_KEY)
    }

    async fn save_wrapped_content_key(&self, serialized: &str) -> SyncResult<()> {
        self.set_setting(CONTENT_KEY_STORAGE_KEY, serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeySession;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_keys_survive_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.redb");

        let (device_pk, content) = {
            let storage = Storage::new(&path).unwrap();
            let session = KeySession::new();
            let device = session.ensure_device_key(&storage).await.unwrap();
            let content = session.ensure_content_key(&storage, &storage).await.unwrap();
            (device.public_key_base64(), content)
        };

        let storage = Storage::new(&path).unwrap();
        let session = KeySession::new();
        let device = session.ensure_device_key(&storage).await.unwrap();
        let reloaded = session.ensure_content_key(&storage, &storage).await.unwrap();

        assert_eq!(device.public_key_base64(), device_pk);
        assert_eq!(reloaded, content);
    }

    #[tokio::test]
    async fn test_stored_material_is_not_the_raw_key() {
        let (storage, _temp) = crate::storage::tests::create_test_storage();
        let session = KeySession::new();

        let content = session.ensure_content_key(&storage, &storage).await.unwrap();

        let wrapped = storage.load_wrapped_content_key().await.unwrap().unwrap();
        let raw = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            content.as_bytes(),
        );
        assert!(!wrapped.contains(&raw));
    }
}
