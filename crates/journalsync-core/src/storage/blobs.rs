//! File-backed blob transport.
//!
//! Metadata and payloads live in separate tables so listing never reads the
//! encrypted payloads. Several devices can point at the same file, which makes
//! it usable as a shared "remote" for local testing and the CLI.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use super::{decode, encode};
use crate::error::{SyncError, SyncResult};
use crate::sync::SyncAdapter;
use crate::types::{BlobDescriptor, RemoteBlobInfo};

/// Blob metadata (key: blob id, value: JSON `RemoteBlobInfo`)
const BLOB_INFO_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blob_info");
/// Encrypted payloads (key: blob id, value: raw bytes)
const BLOB_PAYLOAD_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blob_payload");

/// Blob store in its own redb file.
#[derive(Clone)]
pub struct RedbBlobAdapter {
    db: Arc<RwLock<Database>>,
}

impl RedbBlobAdapter {
    /// Open or create the blob store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BLOB_INFO_TABLE)?;
            let _ = write_txn.open_table(BLOB_PAYLOAD_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> SyncResult<usize> {
        Ok(self.infos(None)?.len())
    }

    fn infos(&self, since: Option<i64>) -> SyncResult<Vec<RemoteBlobInfo>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(BLOB_INFO_TABLE)?;

        let mut infos = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let info: RemoteBlobInfo = decode(value.value())?;
            if since.map_or(true, |s| info.updated_at >= s) {
                infos.push(info);
            }
        }
        Ok(infos)
    }
}

#[async_trait]
impl SyncAdapter for RedbBlobAdapter {
    async fn put_blob(&self, blob: BlobDescriptor) -> SyncResult<()> {
        let info = blob.info();
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut infos = write_txn.open_table(BLOB_INFO_TABLE)?;
            infos.insert(blob.id.as_str(), encode(&info)?.as_slice())?;
            let mut payloads = write_txn.open_table(BLOB_PAYLOAD_TABLE)?;
            payloads.insert(blob.id.as_str(), blob.payload.as_slice())?;
        }
        write_txn.commit()?;

        debug!(id = %blob.id, bytes = blob.payload.len(), "Stored blob");
        Ok(())
    }

    fn supports_listing(&self) -> bool {
        true
    }

    async fn list_blobs(&self, since: Option<i64>) -> SyncResult<Vec<RemoteBlobInfo>> {
        self.infos(since)
    }

    async fn get_blob(&self, id: &str) -> SyncResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(BLOB_PAYLOAD_TABLE)?;

        if let Some(data) = table.get(id)? {
            Ok(Some(data.value().to_vec()))
        } else {
            Ok(None)
        }
    }
}
