//! Journal Sync Core Library
//!
//! Offline-first, end-to-end encrypted synchronization of journal entries.
//!
//! ## Overview
//!
//! Every device records journal changes locally and pushes them as opaque
//! encrypted blobs to an untrusted blob store. Other devices holding the same
//! content key pull the blobs, decrypt them and merge them with
//! last-write-wins semantics.
//!
//! ## Core Principles
//!
//! - **Offline-first**: Changes are recorded locally; sync is best effort
//! - **End-to-end encrypted**: The remote only ever sees routing metadata
//! - **Transport agnostic**: Any [`SyncAdapter`] that can store blobs works
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use journalsync_core::{EntrySnapshot, JournalEngine, RedbBlobAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let remote = Arc::new(RedbBlobAdapter::open("/shared/remote.redb")?);
//!     let engine = JournalEngine::new("~/.journalsync/data", remote)?;
//!
//!     engine.add_entry(EntrySnapshot {
//!         text: Some("Walked by the river".into()),
//!         ..Default::default()
//!     })?;
//!
//!     let report = engine.sync().await?;
//!     println!("pushed {}, pulled {}", report.push.pushed, report.pull.pulled);
//!     Ok(())
//! }
//! ```

pub mod crypto;
pub mod engine;
pub mod error;
pub mod keys;
pub mod storage;
pub mod sync;
pub mod types;

// Re-exports
pub use crypto::PayloadCrypto;
pub use engine::JournalEngine;
pub use error::{SyncError, SyncResult};
pub use keys::{ContentKey, DeviceKeyMaterial, KeySession};
pub use storage::{RedbBlobAdapter, Storage, StoredEntry};
pub use sync::{
    sync_now, MemoryRepository, OfflineAdapter, PullReport, PushReport, SnapshotProvider,
    SyncAdapter, SyncContext, SyncReport, SyncRepository,
};
pub use types::*;
