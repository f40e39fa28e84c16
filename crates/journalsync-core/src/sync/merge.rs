//! Last-write-wins merge of remote changes into a local snapshot
//!
//! The merge is whole-record: for each entity the change with the larger
//! `updated_at` wins and the discarded side is reported as a [`Conflict`].
//!
//! Tie-break at equal timestamps:
//!
//! | local  | remote | outcome |
//! |--------|--------|---------|
//! | same op as remote | same op | already applied, skipped silently |
//! | upsert | delete | remote accepted, conflict `kept: remote` |
//! | delete | upsert | remote discarded, conflict `kept: local` |

use std::collections::HashMap;

use crate::types::{ChangeRecord, Conflict, KeptSide, MergeResult, SyncOperation};

/// Merge outcome plus the remote changes that must be applied locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    pub applied: usize,
    pub conflicts: Vec<Conflict>,
    pub accepted: Vec<ChangeRecord>,
}

impl MergePlan {
    /// Summary without the accepted records.
    pub fn result(&self) -> MergeResult {
        MergeResult {
            applied: self.applied,
            conflicts: self.conflicts.clone(),
        }
    }
}

/// Merge `remote` into `snapshot` (entity id to latest known change).
///
/// The snapshot is updated in place as changes are accepted, so a later remote
/// change for the same entity is compared against the one just accepted.
pub fn last_write_wins_merge(
    snapshot: &mut HashMap<String, ChangeRecord>,
    remote: Vec<ChangeRecord>,
) -> MergePlan {
    let mut accepted = Vec::new();
    let mut conflicts = Vec::new();

    for change in remote {
        match snapshot.get(&change.entity_id) {
            None => {}
            Some(local) if change.updated_at > local.updated_at => {
                conflicts.push(Conflict {
                    entity_id: change.entity_id.clone(),
                    kept: KeptSide::Remote,
                    discarded_updated_at: local.updated_at,
                });
            }
            Some(local) if change.updated_at == local.updated_at => {
                if change.op == local.op {
                    // Already applied
                    continue;
                }
                if change.op == SyncOperation::Delete {
                    conflicts.push(Conflict {
                        entity_id: change.entity_id.clone(),
                        kept: KeptSide::Remote,
                        discarded_updated_at: local.updated_at,
                    });
                } else {
                    conflicts.push(Conflict {
                        entity_id: change.entity_id.clone(),
                        kept: KeptSide::Local,
                        discarded_updated_at: change.updated_at,
                    });
                    continue;
                }
            }
            Some(_) => {
                conflicts.push(Conflict {
                    entity_id: change.entity_id.clone(),
                    kept: KeptSide::Local,
                    discarded_updated_at: change.updated_at,
                });
                continue;
            }
        }

        snapshot.insert(change.entity_id.clone(), change.clone());
        accepted.push(change);
    }

    MergePlan {
        applied: accepted.len(),
        conflicts,
        accepted,
    }
}
