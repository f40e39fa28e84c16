//! Main JournalEngine - the primary entry point for Journal Sync
//!
//! JournalEngine ties together:
//! - [`Storage`] for journal entries, the sync log and key material
//! - A [`SyncAdapter`] that carries encrypted blobs to and from the remote
//! - A [`KeySession`] caching the device keypair and content key
//!
//! # Example
//!
//! ```ignore
//! use journalsync_core::{EntrySnapshot, JournalEngine, RedbBlobAdapter};
//!
//! let remote = RedbBlobAdapter::open("/shared/remote.redb")?;
//! let engine = JournalEngine::new("~/.journalsync/data", Arc::new(remote))?;
//!
//! engine.add_entry(EntrySnapshot { text: Some("Dear diary".into()), ..Default::default() })?;
//! let report = engine.sync().await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::crypto::{decrypt_field, encrypt_field};
use crate::error::SyncError;
use crate::keys::{parse_public_key, seal_content_key_for, ContentKey, DeviceKeyMaterial, KeySession};
use crate::storage::{new_entity_id, Storage, StoredEntry};
use crate::sync::{
    pull_remote_changes, push_pending_changes, sync_now, PullReport, PushReport, SyncAdapter,
    SyncContext, SyncReport,
};
use crate::types::{ChangeRecord, EntrySnapshot};

/// Database file inside the data directory
pub const JOURNAL_DB_FILE: &str = "journal.redb";

/// Main entry point for Journal Sync
pub struct JournalEngine {
    storage: Storage,
    adapter: Arc<dyn SyncAdapter>,
    keys: KeySession,
    data_dir: PathBuf,
}

impl JournalEngine {
    /// Open (or create) the journal in `data_dir`, syncing through `adapter`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Io` if the directory cannot be created.
    /// Returns `SyncError::Database` if storage initialization fails.
    pub fn new(
        data_dir: impl AsRef<Path>,
        adapter: Arc<dyn SyncAdapter>,
    ) -> Result<Self, SyncError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!(?data_dir, "Initializing JournalEngine");

        std::fs::create_dir_all(&data_dir)?;
        let storage = Storage::new(data_dir.join(JOURNAL_DB_FILE))?;

        Ok(Self {
            storage,
            adapter,
            keys: KeySession::new(),
            data_dir,
        })
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get a reference to the storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn context(&self) -> SyncContext<'_> {
        SyncContext {
            adapter: self.adapter.as_ref(),
            repository: &self.storage,
            keys: &self.keys,
            device_store: &self.storage,
            content_store: &self.storage,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Journal entries
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a new entry and return its id.
    pub fn add_entry(&self, entry: EntrySnapshot) -> Result<String, SyncError> {
        let entity_id = new_entity_id();
        self.storage.record_upsert(&entity_id, entry, None)?;
        Ok(entity_id)
    }

    /// Replace the contents of an entry (creating it if unknown).
    pub fn update_entry(
        &self,
        entity_id: &str,
        entry: EntrySnapshot,
        embedding: Option<Vec<f32>>,
    ) -> Result<ChangeRecord, SyncError> {
        self.storage.record_upsert(entity_id, entry, embedding)
    }

    /// Soft-delete an entry.
    pub fn delete_entry(&self, entity_id: &str) -> Result<ChangeRecord, SyncError> {
        self.storage.record_delete(entity_id)
    }

    /// Entries that are not deleted, newest first.
    pub fn list_entries(&self) -> Result<Vec<StoredEntry>, SyncError> {
        self.storage.list_entries(false)
    }

    /// Number of local changes not yet pushed.
    pub fn pending_count(&self) -> Result<u64, SyncError> {
        self.storage.pending_count()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sync
    // ═══════════════════════════════════════════════════════════════════════

    /// Push pending local changes.
    pub async fn push(&self) -> Result<PushReport, SyncError> {
        push_pending_changes(&self.context()).await
    }

    /// Pull and merge remote changes.
    pub async fn pull(&self) -> Result<PullReport, SyncError> {
        pull_remote_changes(&self.context(), &self.storage).await
    }

    /// Push, then pull.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        sync_now(&self.context(), &self.storage).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Keys
    // ═══════════════════════════════════════════════════════════════════════

    /// This device's keypair, generated on first use.
    pub async fn device_key(&self) -> Result<Arc<DeviceKeyMaterial>, SyncError> {
        self.keys.ensure_device_key(&self.storage).await
    }

    /// Whether a content key has been created or enrolled on this device.
    pub async fn has_content_key(&self) -> Result<bool, SyncError> {
        self.keys.has_content_key(&self.storage).await
    }

    async fn content_key(&self) -> Result<ContentKey, SyncError> {
        self.keys
            .ensure_content_key(&self.storage, &self.storage)
            .await
    }

    /// Seal this journal's content key to another device's public key
    /// (base64), for that device to enroll.
    pub async fn share_content_key(&self, recipient_public_key: &str) -> Result<String, SyncError> {
        let recipient = parse_public_key(recipient_public_key)?;
        let key = self.content_key().await?;
        seal_content_key_for(&key, &recipient)
    }

    /// Adopt a content key another device sealed to this device.
    ///
    /// Replaces any content key this device had before.
    pub async fn enroll_shared_key(&self, sealed: &str) -> Result<(), SyncError> {
        let key = self
            .keys
            .open_shared_content_key(sealed, &self.storage)
            .await?;
        self.keys
            .enroll_content_key(key, &self.storage, &self.storage)
            .await
    }

    /// Encrypt a single value with the content key as a base64 string.
    pub async fn encrypt_field<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SyncError> {
        let key = self.content_key().await?;
        encrypt_field(value, key.as_bytes())
    }

    /// Decrypt a value produced by [`JournalEngine::encrypt_field`].
    pub async fn decrypt_field<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, SyncError> {
        let key = self.content_key().await?;
        decrypt_field(encoded, key.as_bytes())
    }
}
