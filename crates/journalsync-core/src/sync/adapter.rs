//! Blob transport contract

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::types::{BlobDescriptor, RemoteBlobInfo};

/// Uploads and (optionally) enumerates and fetches opaque encrypted blobs.
///
/// Only `put_blob` is mandatory. Transports that can also read back override
/// [`SyncAdapter::supports_listing`] together with `list_blobs` and `get_blob`;
/// the pull pipeline does nothing for transports that do not.
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Store a blob, replacing any existing blob with the same id.
    async fn put_blob(&self, blob: BlobDescriptor) -> SyncResult<()>;

    /// Whether `list_blobs` and `get_blob` are implemented.
    fn supports_listing(&self) -> bool {
        false
    }

    /// Metadata of stored blobs, optionally only those updated at or after
    /// `since` (Unix milliseconds).
    async fn list_blobs(&self, _since: Option<i64>) -> SyncResult<Vec<RemoteBlobInfo>> {
        Ok(Vec::new())
    }

    /// Encrypted payload of one blob, `None` if it does not exist.
    async fn get_blob(&self, _id: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(None)
    }
}
