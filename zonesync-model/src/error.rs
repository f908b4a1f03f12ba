//! Error types for schema declaration.

use thiserror::Error;

/// Result type for schema operations.
pub type ModelResult<T> = Result<T, SchemaError>;

/// A schema that cannot be synced. These are setup-time programmer errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The record type name is empty.
    #[error("record type name must not be empty")]
    EmptyRecordType,

    /// No primary key was declared.
    #[error("{record_type}: no primary key declared")]
    MissingPrimaryKey { record_type: String },

    /// No tombstone field was declared.
    #[error("{record_type}: no tombstone field declared")]
    MissingTombstone { record_type: String },

    /// The tombstone field is not a boolean.
    #[error("{record_type}: tombstone field {field} must be a bool")]
    TombstoneNotBool { record_type: String, field: String },

    /// Two fields share a name.
    #[error("{record_type}: duplicate field {field}")]
    DuplicateField { record_type: String, field: String },

    /// A field reuses the primary key's name.
    #[error("{record_type}: field {field} shadows the primary key")]
    FieldShadowsPrimaryKey { record_type: String, field: String },

    /// A relationship points at a type with no registered schema.
    #[error("{record_type}.{field}: no schema registered for related type {target}")]
    UnknownRelatedType {
        record_type: String,
        field: String,
        target: String,
    },
}
