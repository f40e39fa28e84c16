//! Change repository contract and an in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SyncResult;
use crate::types::ChangeRecord;

/// Local record store as seen by the sync pipelines.
#[async_trait]
pub trait SyncRepository: Send + Sync {
    /// Local changes not yet pushed.
    async fn list_pending(&self) -> SyncResult<Vec<ChangeRecord>>;
    /// Forget the pending markers of pushed changes.
    async fn mark_synced(&self, ids: &[String]) -> SyncResult<()>;
    /// Write accepted remote changes into local state.
    async fn apply_remote(&self, changes: &[ChangeRecord]) -> SyncResult<()>;
}

/// Supplies the latest locally known change per entity for merging.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> SyncResult<HashMap<String, ChangeRecord>>;
}

#[derive(Default)]
struct MemoryState {
    pending: Vec<ChangeRecord>,
    latest: HashMap<String, ChangeRecord>,
}

/// In-memory repository (intended for tests and simulations).
///
/// `latest` always holds the newest change per entity, whether it was
/// recorded locally or applied from remote.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local mutation: queue it for push and make it current.
    pub fn record(&self, change: ChangeRecord) {
        let mut state = self.state.lock();
        state.latest.insert(change.entity_id.clone(), change.clone());
        state.pending.push(change);
    }

    /// Latest known change for an entity.
    pub fn get(&self, entity_id: &str) -> Option<ChangeRecord> {
        self.state.lock().latest.get(entity_id).cloned()
    }

    /// Number of changes waiting to be pushed.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

#[async_trait]
impl SyncRepository for MemoryRepository {
    async fn list_pending(&self) -> SyncResult<Vec<ChangeRecord>> {
        Ok(self.state.lock().pending.clone())
    }

    async fn mark_synced(&self, ids: &[String]) -> SyncResult<()> {
        self.state.lock().pending.retain(|c| !ids.contains(&c.id));
        Ok(())
    }

    async fn apply_remote(&self, changes: &[ChangeRecord]) -> SyncResult<()> {
        let mut state = self.state.lock();
        for change in changes {
            state.latest.insert(change.entity_id.clone(), change.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotProvider for MemoryRepository {
    async fn snapshot(&self) -> SyncResult<HashMap<String, ChangeRecord>> {
        Ok(self.state.lock().latest.clone())
    }
}
