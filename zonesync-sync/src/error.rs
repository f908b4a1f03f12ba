//! Error types for the sync layer.

use thiserror::Error;
use zonesync_storage::StorageError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for record conversion.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record conversion error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Constructed outside a tokio runtime.
    #[error("no tokio runtime available for the background queue")]
    NoRuntime,

    /// Two sync objects registered for the same record type.
    #[error("record type already registered: {0}")]
    DuplicateRecordType(String),
}

/// Errors converting between local objects and remote records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The record belongs to another model type.
    #[error("record type mismatch: expected {expected}, found {found}")]
    RecordTypeMismatch { expected: String, found: String },

    /// The record name cannot be turned into a primary key, or vice versa.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] zonesync_types::Error),

    /// A field holds a value of the wrong type.
    #[error("field {field}: expected {expected}, found {found}")]
    FieldTypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    /// A relationship targets a type the codec has no schema for.
    #[error("field {field}: no schema for related type {target}")]
    UnknownRelatedType { field: String, target: String },

    /// No zone is known yet for this object.
    #[error("no zone resolved for {record_type} {key}")]
    NoZone { record_type: String, key: String },

    /// Local storage error while looking up related rows.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
