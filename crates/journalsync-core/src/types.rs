//! Core types for Journal Sync

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Kind of mutation a change record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    /// Entity was created or modified
    Upsert,
    /// Entity was deleted
    Delete,
}

impl SyncOperation {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Upsert => "upsert",
            SyncOperation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plaintext snapshot of one journal entry.
///
/// Known journal fields are typed; anything else a newer client writes is
/// kept verbatim in `extra` so it survives a round trip through this version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Unix milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_persona: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_persona: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words_json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints_json: Option<Value>,
    /// Older clients store this as 0/1
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flag_from_bool_or_number"
    )]
    pub favorite: Option<bool>,
    /// Fields this version does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntrySnapshot {
    /// Snapshot holding just an id and text.
    pub fn with_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

fn flag_from_bool_or_number<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::Number(n)) => Ok(Some(n.as_f64().is_some_and(|f| f != 0.0))),
        Some(other) => Err(de::Error::custom(format!(
            "expected bool or number for favorite, got {}",
            other
        ))),
    }
}

/// One pending local mutation, or one decrypted remote mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Change identifier (also the blob id on the wire)
    pub id: String,
    /// Journal entry this change targets
    pub entity_id: String,
    pub op: SyncOperation,
    /// Unix milliseconds, monotonically increasing per entity
    pub updated_at: i64,
    pub entry: EntrySnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ChangeRecord {
    /// Upsert change with a fresh ULID change id.
    pub fn upsert(entity_id: impl Into<String>, updated_at: i64, entry: EntrySnapshot) -> Self {
        Self {
            id: Ulid::new().to_string(),
            entity_id: entity_id.into(),
            op: SyncOperation::Upsert,
            updated_at,
            entry,
            embedding: None,
        }
    }

    /// Delete change with a fresh ULID change id.
    pub fn delete(entity_id: impl Into<String>, updated_at: i64) -> Self {
        let entity_id = entity_id.into();
        Self {
            id: Ulid::new().to_string(),
            entry: EntrySnapshot {
                id: Some(entity_id.clone()),
                ..Default::default()
            },
            entity_id,
            op: SyncOperation::Delete,
            updated_at,
            embedding: None,
        }
    }

    /// Attach an embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Routing metadata for this change.
    pub fn blob_info(&self) -> RemoteBlobInfo {
        RemoteBlobInfo {
            id: self.id.clone(),
            entity_id: self.entity_id.clone(),
            updated_at: self.updated_at,
            op: self.op,
        }
    }
}

/// Unencrypted routing metadata of a remote blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBlobInfo {
    pub id: String,
    pub entity_id: String,
    pub updated_at: i64,
    pub op: SyncOperation,
}

/// The unit exchanged with a blob transport: metadata plus encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDescriptor {
    pub id: String,
    pub entity_id: String,
    pub updated_at: i64,
    pub op: SyncOperation,
    pub payload: Vec<u8>,
}

impl BlobDescriptor {
    /// Metadata without the payload.
    pub fn info(&self) -> RemoteBlobInfo {
        RemoteBlobInfo {
            id: self.id.clone(),
            entity_id: self.entity_id.clone(),
            updated_at: self.updated_at,
            op: self.op,
        }
    }
}

/// Which side of a conflict was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeptSide {
    Local,
    Remote,
}

/// A discarded change reported by the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub entity_id: String,
    pub kept: KeptSide,
    pub discarded_updated_at: i64,
}

/// Outcome of merging remote changes into local state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub applied: usize,
    pub conflicts: Vec<Conflict>,
}
