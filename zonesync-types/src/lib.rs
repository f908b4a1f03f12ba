//! Core type definitions for zonesync.
//!
//! This crate defines the values that cross the boundary between the local
//! object store and the remote record store:
//! - Primary keys, zone identifiers and record identifiers
//! - Remote records and their field values
//! - Opaque per-zone sync cursors
//!
//! Nothing here performs I/O. Model reflection lives in `zonesync-model`,
//! local persistence in `zonesync-storage`.

mod cursor;
mod ids;
mod record;

pub use cursor::SyncCursor;
pub use ids::{DEFAULT_ZONE_OWNER, KeyKind, MAX_RECORD_NAME_LEN, PrimaryKey, RecordId, ZoneId};
pub use record::{
    AssetPointer, Location, RecordReference, ReferenceAction, RemoteRecord, RemoteValue,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid record name {name:?}: {reason}")]
    InvalidRecordName { name: String, reason: &'static str },
}
