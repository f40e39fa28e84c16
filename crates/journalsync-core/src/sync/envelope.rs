//! Encrypted entry envelopes
//!
//! A [`ChangeRecord`] travels as an encrypted JSON document:
//!
//! ```text
//! { "version": 1, "op": "upsert", "updatedAt": 1000, "entry": {..}, "embedding": [..] | null }
//! ```
//!
//! Routing identifiers are not part of the ciphertext. They come from the
//! blob metadata and are supplied by the caller on unpack.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::PayloadCrypto;
use crate::error::SyncError;
use crate::keys::ContentKey;
use crate::types::{ChangeRecord, EntrySnapshot, SyncOperation};

/// Current entry envelope version
pub const ENVELOPE_VERSION: u64 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryEnvelope {
    // Validated on the raw document before deserializing
    #[serde(skip_deserializing)]
    version: u64,
    op: SyncOperation,
    updated_at: i64,
    entry: EntrySnapshot,
    embedding: Option<Vec<f32>>,
}

/// Encrypt a change record into a payload.
///
/// # Errors
///
/// `SyncError::Serialization` if the embedding holds non-finite values (JSON
/// cannot carry them), `SyncError::Crypto` if encryption fails.
pub fn pack_entry(record: &ChangeRecord, key: &ContentKey) -> Result<Vec<u8>, SyncError> {
    if let Some(embedding) = &record.embedding {
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(SyncError::Serialization(format!(
                "Embedding for change {} contains non-finite values",
                record.id
            )));
        }
    }

    let envelope = EntryEnvelope {
        version: ENVELOPE_VERSION,
        op: record.op,
        updated_at: record.updated_at,
        entry: record.entry.clone(),
        embedding: record.embedding.clone(),
    };
    PayloadCrypto::new(key.as_bytes()).encrypt_json(&envelope)
}

/// Decrypt a payload into a change record.
///
/// # Errors
///
/// - `SyncError::DecryptionFailed` for a bad header, truncation or wrong key
/// - `SyncError::EnvelopeVersionUnsupported` for any version other than 1,
///   carrying the raw JSON value
/// - `SyncError::Serialization` if a version 1 document is malformed
pub fn unpack_entry(
    payload: &[u8],
    change_id: &str,
    entity_id: &str,
    key: &ContentKey,
) -> Result<ChangeRecord, SyncError> {
    let document: Value = PayloadCrypto::new(key.as_bytes()).decrypt_json(payload)?;

    // Check the version before trusting the rest of the document; `1.0` counts as 1
    match document.get("version") {
        Some(v) if v.as_f64() == Some(ENVELOPE_VERSION as f64) => {}
        Some(other) => return Err(SyncError::EnvelopeVersionUnsupported(other.to_string())),
        None => return Err(SyncError::EnvelopeVersionUnsupported("missing".to_string())),
    }

    let envelope: EntryEnvelope = serde_json::from_value(document)
        .map_err(|e| SyncError::Serialization(format!("Malformed entry envelope: {}", e)))?;

    Ok(ChangeRecord {
        id: change_id.to_string(),
        entity_id: entity_id.to_string(),
        op: envelope.op,
        updated_at: envelope.updated_at,
        entry: envelope.entry,
        embedding: envelope.embedding,
    })
}
