//! Pull pipeline: remote blobs merged into local state

use tracing::{debug, info, warn};

use super::envelope::unpack_entry;
use super::merge::last_write_wins_merge;
use super::repository::SnapshotProvider;
use super::SyncContext;
use crate::error::SyncResult;
use crate::types::MergeResult;

/// Outcome of one pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Remote blobs that were fetched and decrypted
    pub pulled: usize,
    pub merge: MergeResult,
}

/// Fetch, decrypt and merge every remote blob, applying the winners.
///
/// Unreadable blobs (bad header, wrong key, unknown version, malformed JSON)
/// are skipped one by one. Key, storage and transport errors abort the pull
/// before anything is applied.
pub async fn pull_remote_changes(
    ctx: &SyncContext<'_>,
    snapshot: &dyn SnapshotProvider,
) -> SyncResult<PullReport> {
    if !ctx.adapter.supports_listing() {
        debug!("Transport cannot list blobs, skipping pull");
        return Ok(PullReport::default());
    }

    let infos = ctx.adapter.list_blobs(None).await?;
    if infos.is_empty() {
        return Ok(PullReport::default());
    }

    let key = ctx
        .keys
        .ensure_content_key(ctx.content_store, ctx.device_store)
        .await?;
    let mut local = snapshot.snapshot().await?;

    let mut unpacked = Vec::with_capacity(infos.len());
    for info in &infos {
        let Some(payload) = ctx.adapter.get_blob(&info.id).await? else {
            debug!(id = %info.id, "Blob listed but not found");
            continue;
        };
        match unpack_entry(&payload, &info.id, &info.entity_id, &key) {
            Ok(change) => {
                if change.updated_at != info.updated_at || change.op != info.op {
                    warn!(
                        id = %info.id,
                        listed_updated_at = info.updated_at,
                        envelope_updated_at = change.updated_at,
                        "Blob metadata differs from encrypted envelope"
                    );
                }
                unpacked.push(change);
            }
            Err(e) if e.is_payload_error() => {
                warn!(id = %info.id, error = %e, "Skipping unreadable blob");
            }
            Err(e) => return Err(e),
        }
    }

    let pulled = unpacked.len();
    let plan = last_write_wins_merge(&mut local, unpacked);
    if !plan.accepted.is_empty() {
        ctx.repository.apply_remote(&plan.accepted).await?;
    }

    info!(
        pulled,
        applied = plan.applied,
        conflicts = plan.conflicts.len(),
        "Pull complete"
    );
    Ok(PullReport {
        pulled,
        merge: plan.result(),
    })
}
