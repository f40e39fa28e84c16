//! In-memory reference transport
//!
//! [`OfflineAdapter`] keeps blobs in a list keyed by id. Clones share the same
//! list, which lets two simulated devices talk through one "remote".

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::adapter::SyncAdapter;
use crate::error::SyncResult;
use crate::types::{BlobDescriptor, RemoteBlobInfo};

/// In-memory blob store with upsert-by-id semantics.
#[derive(Clone, Default)]
pub struct OfflineAdapter {
    blobs: Arc<RwLock<Vec<BlobDescriptor>>>,
}

impl OfflineAdapter {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// True if no blob is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Copy of every stored blob, in insertion order.
    pub fn blobs(&self) -> Vec<BlobDescriptor> {
        self.blobs.read().clone()
    }

    /// Replace the payload of a stored blob (used to simulate corruption).
    pub fn overwrite_payload(&self, id: &str, payload: Vec<u8>) -> bool {
        let mut blobs = self.blobs.write();
        match blobs.iter_mut().find(|b| b.id == id) {
            Some(blob) => {
                blob.payload = payload;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SyncAdapter for OfflineAdapter {
    async fn put_blob(&self, blob: BlobDescriptor) -> SyncResult<()> {
        let mut blobs = self.blobs.write();
        match blobs.iter().position(|b| b.id == blob.id) {
            Some(index) => {
                debug!(id = %blob.id, "Replacing blob");
                blobs[index] = blob;
            }
            None => blobs.push(blob),
        }
        Ok(())
    }

    fn supports_listing(&self) -> bool {
        true
    }

    async fn list_blobs(&self, since: Option<i64>) -> SyncResult<Vec<RemoteBlobInfo>> {
        Ok(self
            .blobs
            .read()
            .iter()
            .filter(|b| since.map_or(true, |s| b.updated_at >= s))
            .map(BlobDescriptor::info)
            .collect())
    }

    async fn get_blob(&self, id: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.payload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncOperation;

    fn blob(id: &str, ts: i64, payload: &[u8]) -> BlobDescriptor {
        BlobDescriptor {
            id: id.to_string(),
            entity_id: format!("entity-{}", id),
            updated_at: ts,
            op: SyncOperation::Upsert,
            payload: payload.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_put_replaces_by_id() {
        let adapter = OfflineAdapter::new();
        adapter.put_blob(blob("a", 1, b"one")).await.unwrap();
        adapter.put_blob(blob("b", 2, b"two")).await.unwrap();
        adapter.put_blob(blob("a", 3, b"three")).await.unwrap();

        assert_eq!(adapter.len(), 2);
        assert_eq!(adapter.get_blob("a").await.unwrap().unwrap(), b"three");
        assert_eq!(adapter.blobs()[0].updated_at, 3);
    }

    #[tokio::test]
    async fn test_list_and_since_filter() {
        let adapter = OfflineAdapter::new();
        for (id, ts) in [("a", 10), ("b", 20), ("c", 30)] {
            adapter.put_blob(blob(id, ts, b"x")).await.unwrap();
        }

        assert_eq!(adapter.list_blobs(None).await.unwrap().len(), 3);
        let recent = adapter.list_blobs(Some(20)).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let adapter = OfflineAdapter::new();
        let other = adapter.clone();
        adapter.put_blob(blob("a", 1, b"x")).await.unwrap();

        assert!(!other.is_empty());
        assert!(other.get_blob("missing").await.unwrap().is_none());
    }
}
