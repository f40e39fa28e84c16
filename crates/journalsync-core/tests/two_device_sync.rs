//! Two-device synchronization tests
//!
//! Two devices with their own local storage exchange encrypted blobs through
//! a shared transport. Both the in-memory `OfflineAdapter` and the file-backed
//! `RedbBlobAdapter` are used as the shared remote.
//!
//! ## What These Tests Verify
//!
//! - A payload written on one device is readable on another with the same key
//! - Push/pull convergence, including deletes
//! - Last-write-wins conflict reporting in both directions
//! - Repeated sync rounds are idempotent

use std::sync::Arc;

use journalsync_core::keys::{seal_content_key_for, MemoryKeyStore};
use journalsync_core::sync::{pack_entry, pull_remote_changes, push_pending_changes, unpack_entry};
use journalsync_core::{
    ChangeRecord, EntrySnapshot, JournalEngine, KeptSide, KeySession, MemoryRepository,
    OfflineAdapter, RedbBlobAdapter, SyncAdapter, SyncContext, SyncOperation,
};
use tempfile::{tempdir, TempDir};

fn text(t: &str) -> EntrySnapshot {
    EntrySnapshot {
        text: Some(t.to_string()),
        ..Default::default()
    }
}

/// Create two engines sharing one remote, with B enrolled into A's journal.
async fn paired_engines(remote: Arc<dyn SyncAdapter>) -> (JournalEngine, JournalEngine, TempDir) {
    let temp = tempdir().unwrap();
    let a = JournalEngine::new(temp.path().join("a"), remote.clone()).unwrap();
    let b = JournalEngine::new(temp.path().join("b"), remote).unwrap();

    let b_pk = b.device_key().await.unwrap().public_key_base64();
    let sealed = a.share_content_key(&b_pk).await.unwrap();
    b.enroll_shared_key(&sealed).await.unwrap();

    (a, b, temp)
}

#[tokio::test]
async fn test_hallo_payload_crosses_devices() {
    let remote = OfflineAdapter::new();

    // Device A
    let a_keys = KeySession::new();
    let a_store = MemoryKeyStore::new();
    let a_repo = MemoryRepository::new();
    let key = a_keys.ensure_content_key(&a_store, &a_store).await.unwrap();
    let change = ChangeRecord::upsert("entry-1", 1000, text("hallo"));
    a_repo.record(change.clone());
    let a_ctx = SyncContext {
        adapter: &remote,
        repository: &a_repo,
        keys: &a_keys,
        device_store: &a_store,
        content_store: &a_store,
    };
    push_pending_changes(&a_ctx).await.unwrap();

    // Device B holds the same unwrapped content key
    let b_keys = KeySession::new();
    let b_store = MemoryKeyStore::new();
    b_keys.cache_content_key(key).await;
    let b_key = b_keys.ensure_content_key(&b_store, &b_store).await.unwrap();

    let blob = &remote.blobs()[0];
    assert_eq!(blob.updated_at, 1000);
    let decoded = unpack_entry(&blob.payload, &blob.id, &blob.entity_id, &b_key).unwrap();

    assert_eq!(decoded.entry, text("hallo"));
    assert_eq!(decoded.updated_at, 1000);
    assert_eq!(decoded.entity_id, "entry-1");
    assert_eq!(decoded.op, SyncOperation::Upsert);
}

#[tokio::test]
async fn test_cached_key_device_pulls_without_stored_key() {
    let remote = OfflineAdapter::new();
    let a_keys = KeySession::new();
    let a_store = MemoryKeyStore::new();
    let key = a_keys.ensure_content_key(&a_store, &a_store).await.unwrap();
    remote
        .put_blob(journalsync_core::BlobDescriptor {
            id: "c1".to_string(),
            entity_id: "entry-1".to_string(),
            updated_at: 1000,
            op: SyncOperation::Upsert,
            payload: pack_entry(&ChangeRecord::upsert("entry-1", 1000, text("hallo")), &key)
                .unwrap(),
        })
        .await
        .unwrap();

    let b_keys = KeySession::new();
    let b_store = MemoryKeyStore::new();
    let b_repo = MemoryRepository::new();
    b_keys.cache_content_key(key).await;
    let b_ctx = SyncContext {
        adapter: &remote,
        repository: &b_repo,
        keys: &b_keys,
        device_store: &b_store,
        content_store: &b_store,
    };

    let report = pull_remote_changes(&b_ctx, &b_repo).await.unwrap();

    assert_eq!(report.merge.applied, 1);
    assert_eq!(b_repo.get("entry-1").unwrap().entry.text.as_deref(), Some("hallo"));
    // The cached key is used as is; nothing is persisted
    assert!(b_store.wrapped_content_key().is_none());
}

#[tokio::test]
async fn test_sealed_key_enrolls_second_device() {
    let a_keys = KeySession::new();
    let a_store = MemoryKeyStore::new();
    let b_keys = KeySession::new();
    let b_store = MemoryKeyStore::new();

    let key = a_keys.ensure_content_key(&a_store, &a_store).await.unwrap();
    let b_device = b_keys.ensure_device_key(&b_store).await.unwrap();
    let sealed = seal_content_key_for(&key, b_device.public_key()).unwrap();

    let opened = b_keys.open_shared_content_key(&sealed, &b_store).await.unwrap();
    b_keys
        .enroll_content_key(opened, &b_store, &b_store)
        .await
        .unwrap();

    b_keys.clear_cached_keys().await;
    let reloaded = b_keys.ensure_content_key(&b_store, &b_store).await.unwrap();
    assert_eq!(reloaded, key);
}

#[tokio::test]
async fn test_engines_converge_through_offline_adapter() {
    let _ = tracing_subscriber::fmt::try_init();
    let remote = Arc::new(OfflineAdapter::new());
    let (a, b, _temp) = paired_engines(remote.clone()).await;

    let first = a.add_entry(text("from a")).unwrap();
    let second = b.add_entry(text("from b")).unwrap();

    a.sync().await.unwrap();
    b.sync().await.unwrap();
    a.sync().await.unwrap();

    let a_ids: Vec<String> = a.list_entries().unwrap().into_iter().map(|e| e.entity_id).collect();
    let b_ids: Vec<String> = b.list_entries().unwrap().into_iter().map(|e| e.entity_id).collect();
    assert_eq!(a_ids.len(), 2);
    assert!(a_ids.contains(&first) && a_ids.contains(&second));
    assert_eq!(
        a_ids.iter().collect::<std::collections::BTreeSet<_>>(),
        b_ids.iter().collect::<std::collections::BTreeSet<_>>()
    );
    assert_eq!(remote.len(), 2);
}

#[tokio::test]
async fn test_engines_converge_through_redb_remote() {
    let remote_dir = tempdir().unwrap();
    let remote = Arc::new(RedbBlobAdapter::open(remote_dir.path().join("remote.redb")).unwrap());
    let (a, b, _temp) = paired_engines(remote.clone()).await;

    let id = a.add_entry(text("river walk")).unwrap();
    a.sync().await.unwrap();
    b.sync().await.unwrap();

    let on_b = b.storage().get_entry(&id).unwrap().unwrap();
    assert_eq!(on_b.entry.text.as_deref(), Some("river walk"));
    assert_eq!(remote.blob_count().unwrap(), 1);
}

#[tokio::test]
async fn test_delete_propagates() {
    let _ = tracing_subscriber::fmt::try_init();
    let remote = Arc::new(OfflineAdapter::new());
    let (a, b, _temp) = paired_engines(remote).await;

    let id = a.add_entry(text("temporary")).unwrap();
    a.sync().await.unwrap();
    b.sync().await.unwrap();
    assert_eq!(b.list_entries().unwrap().len(), 1);

    a.delete_entry(&id).unwrap();
    a.sync().await.unwrap();
    let report = b.sync().await.unwrap();

    assert!(report.pull.merge.applied >= 1);
    assert!(b.list_entries().unwrap().is_empty());
    assert!(b.storage().get_entry(&id).unwrap().unwrap().deleted);
}

#[tokio::test]
async fn test_newer_remote_edit_wins() {
    let remote = Arc::new(OfflineAdapter::new());
    let (a, b, _temp) = paired_engines(remote).await;

    let id = a.add_entry(text("draft")).unwrap();
    a.sync().await.unwrap();
    b.sync().await.unwrap();

    b.update_entry(&id, text("revised on b"), None).unwrap();
    b.sync().await.unwrap();
    let report = a.sync().await.unwrap();

    assert_eq!(
        a.storage().get_entry(&id).unwrap().unwrap().entry.text.as_deref(),
        Some("revised on b")
    );
    assert!(report
        .pull
        .merge
        .conflicts
        .iter()
        .any(|c| c.entity_id == id && c.kept == KeptSide::Remote));
}

#[tokio::test]
async fn test_newer_local_edit_is_kept() {
    let remote = Arc::new(OfflineAdapter::new());
    let (a, b, _temp) = paired_engines(remote).await;

    let id = a.add_entry(text("shared")).unwrap();
    a.sync().await.unwrap();
    b.sync().await.unwrap();

    // B edits without pushing; A's stale blob must not overwrite it
    b.update_entry(&id, text("local only"), None).unwrap();
    let report = b.pull().await.unwrap();

    assert_eq!(report.merge.applied, 0);
    assert_eq!(report.merge.conflicts[0].kept, KeptSide::Local);
    assert_eq!(
        b.storage().get_entry(&id).unwrap().unwrap().entry.text.as_deref(),
        Some("local only")
    );
}

#[tokio::test]
async fn test_repeated_sync_is_idempotent() {
    let remote = Arc::new(OfflineAdapter::new());
    let (a, b, _temp) = paired_engines(remote).await;

    a.add_entry(text("once")).unwrap();
    a.sync().await.unwrap();
    b.sync().await.unwrap();

    let again = b.sync().await.unwrap();

    assert_eq!(again.push.pushed, 0);
    assert_eq!(again.pull.merge.applied, 0);
    assert!(again.pull.merge.conflicts.is_empty());
    assert_eq!(b.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_unenrolled_device_skips_foreign_blobs() {
    let remote = Arc::new(OfflineAdapter::new());
    let temp = tempdir().unwrap();
    let a = JournalEngine::new(temp.path().join("a"), remote.clone()).unwrap();
    let stranger = JournalEngine::new(temp.path().join("s"), remote).unwrap();

    a.add_entry(text("private")).unwrap();
    a.sync().await.unwrap();

    let report = stranger.pull().await.unwrap();

    assert_eq!(report.pulled, 0);
    assert!(stranger.list_entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_pushes_from_enrolled_devices() {
    let _ = tracing_subscriber::fmt::try_init();
    let remote = Arc::new(OfflineAdapter::new());
    let temp = tempdir().unwrap();
    let owner = JournalEngine::new(temp.path().join("owner"), remote.clone()).unwrap();

    let mut devices = Vec::new();
    for i in 0..4 {
        let device = JournalEngine::new(temp.path().join(format!("d{}", i)), remote.clone()).unwrap();
        let pk = device.device_key().await.unwrap().public_key_base64();
        device
            .enroll_shared_key(&owner.share_content_key(&pk).await.unwrap())
            .await
            .unwrap();
        device.add_entry(text(&format!("note {}", i))).unwrap();
        devices.push(device);
    }

    let reports = futures::future::join_all(devices.iter().map(|d| d.push())).await;
    assert!(reports
        .iter()
        .all(|r| matches!(r, Ok(report) if report.pushed == 1)));

    let report = owner.pull().await.unwrap();
    assert_eq!(report.merge.applied, 4);
    assert_eq!(owner.list_entries().unwrap().len(), 4);
}
