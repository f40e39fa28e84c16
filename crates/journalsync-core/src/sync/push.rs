//! Push pipeline: pending local changes to encrypted remote blobs

use tracing::{debug, info};

use super::envelope::pack_entry;
use super::SyncContext;
use crate::error::SyncResult;
use crate::types::BlobDescriptor;

/// Outcome of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: usize,
    pub blobs: Vec<BlobDescriptor>,
}

/// Encrypt and upload every pending change, then mark them synced.
///
/// Nothing is marked synced unless every upload succeeded; a failed push is
/// retried by pushing the whole pending batch again.
pub async fn push_pending_changes(ctx: &SyncContext<'_>) -> SyncResult<PushReport> {
    let pending = ctx.repository.list_pending().await?;
    if pending.is_empty() {
        debug!("No pending changes to push");
        return Ok(PushReport::default());
    }

    let key = ctx
        .keys
        .ensure_content_key(ctx.content_store, ctx.device_store)
        .await?;

    let mut blobs = Vec::with_capacity(pending.len());
    for change in &pending {
        let descriptor = BlobDescriptor {
            id: change.id.clone(),
            entity_id: change.entity_id.clone(),
            updated_at: change.updated_at,
            op: change.op,
            payload: pack_entry(change, &key)?,
        };
        ctx.adapter.put_blob(descriptor.clone()).await?;
        debug!(id = %change.id, entity = %change.entity_id, op = %change.op, "Uploaded blob");
        blobs.push(descriptor);
    }

    let ids: Vec<String> = pending.iter().map(|c| c.id.clone()).collect();
    ctx.repository.mark_synced(&ids).await?;

    info!(pushed = blobs.len(), "Push complete");
    Ok(PushReport {
        pushed: blobs.len(),
        blobs,
    })
}
