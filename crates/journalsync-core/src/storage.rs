//! Persistent storage using redb.
//!
//! This module provides ACID-compliant storage for:
//! - Settings, including the serialized device key and wrapped content key
//! - Journal entries (latest snapshot per entity, soft deletes)
//! - The sync log of changes waiting to be pushed
//!
//! [`RedbBlobAdapter`] is a separate database holding encrypted blobs; it acts
//! as a file-backed stand-in for a remote blob store.

use crate::error::SyncError;
use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;

// Submodules
mod blobs;
mod journal;
mod keys;

use journal::{ENTRIES_TABLE, SYNC_LOG_TABLE};

pub use blobs::RedbBlobAdapter;
pub use journal::{new_entity_id, StoredEntry};

// Table definitions
const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

/// Local record store using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
            let _ = write_txn.open_table(ENTRIES_TABLE)?;
            let _ = write_txn.open_table(SYNC_LOG_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Settings
    // ═══════════════════════════════════════════════════════════════════════

    /// Store a setting value, overwriting any previous value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            table.insert(key, value.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load a setting value.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;

        match table.get(key)? {
            Some(value) => String::from_utf8(value.value().to_vec())
                .map(Some)
                .map_err(|_| SyncError::Storage(format!("Setting {} is not UTF-8", key))),
            None => Ok(None),
        }
    }

    /// Remove a setting.
    pub fn delete_setting(&self, key: &str) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(value).map_err(|e| SyncError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SyncError> {
    serde_json::from_slice(bytes).map_err(|e| SyncError::Serialization(e.to_string()))
}
