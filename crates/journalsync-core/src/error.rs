//! Error types for Journal Sync

use thiserror::Error;

/// Main error type for Journal Sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Error reported by a key store or change repository
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Decryption failed (wrong key, tampered data, or malformed input)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Entry envelope version not supported
    #[error("Envelope version {0} is not supported")]
    EnvelopeVersionUnsupported(String),

    /// Serialized key material could not be decoded
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Blob transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SyncError {
    /// True for failures caused by the payload bytes themselves rather than
    /// by storage or transport.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            SyncError::DecryptionFailed(_)
                | SyncError::EnvelopeVersionUnsupported(_)
                | SyncError::Serialization(_)
        )
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;
