//! Journal entries and the sync log.
//!
//! Every local mutation writes the entry row and a sync-log row in the same
//! transaction. The sync log holds one row per pending change, keyed by the
//! change id; pushing removes the rows.

use std::collections::HashMap;

use async_trait::async_trait;
use redb::{ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use super::{decode, encode, Storage};
use crate::error::{SyncError, SyncResult};
use crate::sync::{SnapshotProvider, SyncRepository};
use crate::types::{ChangeRecord, EntrySnapshot, SyncOperation};

pub(super) const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");
pub(super) const SYNC_LOG_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_log");

/// Latest local state of one journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub entity_id: String,
    pub entry: EntrySnapshot,
    /// Unix milliseconds of the last local or applied remote change
    pub updated_at: i64,
    /// Soft-delete flag; deleted rows stay as tombstones
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl StoredEntry {
    /// This row as the change it represents, for merging.
    fn as_change(&self) -> ChangeRecord {
        ChangeRecord {
            id: self.entity_id.clone(),
            entity_id: self.entity_id.clone(),
            op: if self.deleted {
                SyncOperation::Delete
            } else {
                SyncOperation::Upsert
            },
            updated_at: self.updated_at,
            entry: self.entry.clone(),
            embedding: self.embedding.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncLogRow {
    entity_id: String,
    op: SyncOperation,
    updated_at: i64,
}

/// Wall clock in milliseconds, never below the previous timestamp and
/// strictly above it unless it is already `i64::MAX`.
fn next_timestamp(previous: Option<i64>) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    match previous {
        Some(prev) => now.max(prev.saturating_add(1)),
        None => now,
    }
}

impl Storage {
    /// Create or modify an entry and queue the change for push.
    ///
    /// `created_at` is kept from the existing row when the caller leaves it
    /// unset. The embedding is only replaced when one is given.
    pub fn record_upsert(
        &self,
        entity_id: &str,
        mut entry: EntrySnapshot,
        embedding: Option<Vec<f32>>,
    ) -> SyncResult<ChangeRecord> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let change;
        {
            let mut entries = write_txn.open_table(ENTRIES_TABLE)?;
            let existing: Option<StoredEntry> = match entries.get(entity_id)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            let updated_at = next_timestamp(existing.as_ref().map(|e| e.updated_at));
            entry.id = Some(entity_id.to_string());
            if entry.created_at.is_none() {
                entry.created_at = Some(
                    existing
                        .as_ref()
                        .and_then(|e| e.entry.created_at)
                        .unwrap_or(updated_at),
                );
            }
            let embedding = embedding.or_else(|| existing.and_then(|e| e.embedding));

            let stored = StoredEntry {
                entity_id: entity_id.to_string(),
                entry: entry.clone(),
                updated_at,
                deleted: false,
                embedding: embedding.clone(),
            };
            entries.insert(entity_id, encode(&stored)?.as_slice())?;

            let mut record = ChangeRecord::upsert(entity_id, updated_at, entry);
            record.embedding = embedding;
            change = record;

            let mut log = write_txn.open_table(SYNC_LOG_TABLE)?;
            let row = SyncLogRow {
                entity_id: entity_id.to_string(),
                op: SyncOperation::Upsert,
                updated_at,
            };
            log.insert(change.id.as_str(), encode(&row)?.as_slice())?;
        }
        write_txn.commit()?;

        debug!(entity = %entity_id, id = %change.id, "Recorded upsert");
        Ok(change)
    }

    /// Soft-delete an entry and queue the delete for push.
    pub fn record_delete(&self, entity_id: &str) -> SyncResult<ChangeRecord> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let change;
        {
            let mut entries = write_txn.open_table(ENTRIES_TABLE)?;
            let existing: StoredEntry = match entries.get(entity_id)? {
                Some(value) => decode(value.value())?,
                None => {
                    return Err(SyncError::InvalidOperation(format!(
                        "Entry {} does not exist",
                        entity_id
                    )))
                }
            };

            let updated_at = next_timestamp(Some(existing.updated_at));
            let stored = StoredEntry {
                updated_at,
                deleted: true,
                ..existing
            };
            entries.insert(entity_id, encode(&stored)?.as_slice())?;

            change = ChangeRecord::delete(entity_id, updated_at);
            let mut log = write_txn.open_table(SYNC_LOG_TABLE)?;
            let row = SyncLogRow {
                entity_id: entity_id.to_string(),
                op: SyncOperation::Delete,
                updated_at,
            };
            log.insert(change.id.as_str(), encode(&row)?.as_slice())?;
        }
        write_txn.commit()?;

        debug!(entity = %entity_id, id = %change.id, "Recorded delete");
        Ok(change)
    }

    /// Load one entry, including tombstones.
    pub fn get_entry(&self, entity_id: &str) -> SyncResult<Option<StoredEntry>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ENTRIES_TABLE)?;

        match table.get(entity_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// List entries, newest change first.
    pub fn list_entries(&self, include_deleted: bool) -> SyncResult<Vec<StoredEntry>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ENTRIES_TABLE)?;

        let mut entries = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let entry: StoredEntry = decode(value.value())?;
            if include_deleted || !entry.deleted {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }

    /// Number of changes waiting to be pushed.
    pub fn pending_count(&self) -> SyncResult<u64> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(SYNC_LOG_TABLE)?;
        Ok(table.len()?)
    }

    fn pending_changes(&self) -> SyncResult<Vec<ChangeRecord>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let log = read_txn.open_table(SYNC_LOG_TABLE)?;
        let entries = read_txn.open_table(ENTRIES_TABLE)?;

        let mut pending = Vec::new();
        for item in log.iter()? {
            let (key, value) = item?;
            let row: SyncLogRow = decode(value.value())?;
            let stored: Option<StoredEntry> = match entries.get(row.entity_id.as_str())? {
                Some(v) => Some(decode(v.value())?),
                None => None,
            };
            let (entry, embedding) = match stored {
                Some(s) => (s.entry, s.embedding),
                None => (
                    EntrySnapshot {
                        id: Some(row.entity_id.clone()),
                        ..Default::default()
                    },
                    None,
                ),
            };

            pending.push(ChangeRecord {
                id: key.value().to_string(),
                entity_id: row.entity_id,
                op: row.op,
                updated_at: row.updated_at,
                entry,
                embedding,
            });
        }
        Ok(pending)
    }

    fn remove_from_log(&self, ids: &[String]) -> SyncResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut log = write_txn.open_table(SYNC_LOG_TABLE)?;
            for id in ids {
                log.remove(id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn write_remote(&self, changes: &[ChangeRecord]) -> SyncResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut entries = write_txn.open_table(ENTRIES_TABLE)?;
            for change in changes {
                let existing: Option<StoredEntry> = match entries.get(change.entity_id.as_str())? {
                    Some(value) => Some(decode(value.value())?),
                    None => None,
                };

                let stored = match (change.op, existing) {
                    (SyncOperation::Delete, Some(existing)) => StoredEntry {
                        updated_at: change.updated_at,
                        deleted: true,
                        ..existing
                    },
                    (SyncOperation::Delete, None) => StoredEntry {
                        entity_id: change.entity_id.clone(),
                        entry: change.entry.clone(),
                        updated_at: change.updated_at,
                        deleted: true,
                        embedding: None,
                    },
                    (SyncOperation::Upsert, existing) => {
                        let mut entry = change.entry.clone();
                        entry.id = Some(change.entity_id.clone());
                        if entry.created_at.is_none() {
                            entry.created_at = existing
                                .as_ref()
                                .and_then(|e| e.entry.created_at)
                                .or(Some(change.updated_at));
                        }
                        StoredEntry {
                            entity_id: change.entity_id.clone(),
                            entry,
                            updated_at: change.updated_at,
                            deleted: false,
                            embedding: change
                                .embedding
                                .clone()
                                .or_else(|| existing.and_then(|e| e.embedding)),
                        }
                    }
                };
                entries.insert(change.entity_id.as_str(), encode(&stored)?.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn entry_snapshot(&self) -> SyncResult<HashMap<String, ChangeRecord>> {
        Ok(self
            .list_entries(true)?
            .into_iter()
            .map(|e| (e.entity_id.clone(), e.as_change()))
            .collect())
    }
}

#[async_trait]
impl SyncRepository for Storage {
    async fn list_pending(&self) -> SyncResult<Vec<ChangeRecord>> {
        self.pending_changes()
    }

    async fn mark_synced(&self, ids: &[String]) -> SyncResult<()> {
        self.remove_from_log(ids)
    }

    async fn apply_remote(&self, changes: &[ChangeRecord]) -> SyncResult<()> {
        self.write_remote(changes)
    }
}

#[async_trait]
impl SnapshotProvider for Storage {
    async fn snapshot(&self) -> SyncResult<HashMap<String, ChangeRecord>> {
        self.entry_snapshot()
    }
}

/// Fresh entity id for a new journal entry.
pub fn new_entity_id() -> String {
    Ulid::new().to_string()
}
