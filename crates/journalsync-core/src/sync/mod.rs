//! Encrypted push/pull synchronization
//!
//! ```text
//! SyncRepository ──list_pending──▶ push ──pack_entry──▶ SyncAdapter::put_blob
//! SyncAdapter::get_blob ──▶ pull ──unpack_entry──▶ merge ──apply_remote──▶ SyncRepository
//! ```

pub mod adapter;
pub mod envelope;
pub mod merge;
pub mod offline;
pub mod pull;
pub mod push;
pub mod repository;

pub use adapter::SyncAdapter;
pub use envelope::{pack_entry, unpack_entry, ENVELOPE_VERSION};
pub use merge::{last_write_wins_merge, MergePlan};
pub use offline::OfflineAdapter;
pub use pull::{pull_remote_changes, PullReport};
pub use push::{push_pending_changes, PushReport};
pub use repository::{MemoryRepository, SnapshotProvider, SyncRepository};

use crate::error::SyncResult;
use crate::keys::{DeviceKeyStore, KeySession, WrappedContentKeyStore};

/// Collaborators shared by the push and pull pipelines.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub adapter: &'a dyn SyncAdapter,
    pub repository: &'a dyn SyncRepository,
    pub keys: &'a KeySession,
    pub device_store: &'a dyn DeviceKeyStore,
    pub content_store: &'a dyn WrappedContentKeyStore,
}

/// Result of a full push-then-pull cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub push: PushReport,
    pub pull: PullReport,
}

/// Push pending changes, then pull and merge remote ones.
///
/// The pull only runs if the push succeeded.
pub async fn sync_now(
    ctx: &SyncContext<'_>,
    snapshot: &dyn SnapshotProvider,
) -> SyncResult<SyncReport> {
    let push = push_pending_changes(ctx).await?;
    let pull = pull_remote_changes(ctx, snapshot).await?;
    Ok(SyncReport { push, pull })
}
