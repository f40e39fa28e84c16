//! Pluggable persistence for serialized key material

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SyncResult;

/// Storage key under which the serialized device keypair lives.
pub const DEVICE_KEY_STORAGE_KEY: &str = "journalsync:device-key:v1";

/// Storage key under which the wrapped content key lives.
pub const CONTENT_KEY_STORAGE_KEY: &str = "journalsync:content-key:v1";

/// Persists the serialized device keypair.
#[async_trait]
pub trait DeviceKeyStore: Send + Sync {
    /// Load the serialized keypair, `None` if none was saved yet.
    async fn load_device_key(&self) -> SyncResult<Option<String>>;
    /// Persist a serialized keypair, replacing any previous one.
    async fn save_device_key(&self, serialized: &str) -> SyncResult<()>;
}

/// Persists the content key sealed to this device.
#[async_trait]
pub trait WrappedContentKeyStore: Send + Sync {
    /// Load the wrapped content key, `None` if none was saved yet.
    async fn load_wrapped_content_key(&self) -> SyncResult<Option<String>>;
    /// Persist a wrapped content key, replacing any previous one.
    async fn save_wrapped_content_key(&self, serialized: &str) -> SyncResult<()>;
}

/// In-memory implementation of both key stores (intended for tests).
#[derive(Default)]
pub struct MemoryKeyStore {
    device_key: Mutex<Option<String>>,
    content_key: Mutex<Option<String>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored device key (used to simulate corruption).
    pub fn set_device_key(&self, serialized: Option<String>) {
        *self.device_key.lock() = serialized;
    }

    /// Overwrite the stored wrapped content key.
    pub fn set_wrapped_content_key(&self, serialized: Option<String>) {
        *self.content_key.lock() = serialized;
    }

    /// Currently stored device key.
    pub fn device_key(&self) -> Option<String> {
        self.device_key.lock().clone()
    }

    /// Currently stored wrapped content key.
    pub fn wrapped_content_key(&self) -> Option<String> {
        self.content_key.lock().clone()
    }
}

#[async_trait]
impl DeviceKeyStore for MemoryKeyStore {
    async fn load_device_key(&self) -> SyncResult<Option<String>> {
        Ok(self.device_key())
    }

    async fn save_device_key(&self, serialized: &str) -> SyncResult<()> {
        self.set_device_key(Some(serialized.to_string()));
        Ok(())
    }
}

#[async_trait]
impl WrappedContentKeyStore for MemoryKeyStore {
    async fn load_wrapped_content_key(&self) -> SyncResult<Option<String>> {
        Ok(self.wrapped_content_key())
    }

    async fn save_wrapped_content_key(&self, serialized: &str) -> SyncResult<()> {
        self.set_wrapped_content_key(Some(serialized.to_string()));
        Ok(())
    }
}
