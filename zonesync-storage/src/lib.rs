//! SQLite storage layer for zonesync.
//!
//! Provides the local side of synchronization:
//! - [`ObjectStore`]: typed objects stored as JSON rows, with atomic write
//!   transactions and per-record-type change notification
//! - [`SettingsStore`]: a small key-value store for cursors and flags
//!
//! # Architecture
//!
//! - Objects live in a single table keyed by `(record_type, object_key)` and
//!   ordered by an insertion sequence, so a record type behaves like an
//!   ordered collection
//! - Observers receive index-based change sets after every commit that
//!   touched their record type
//! - A write can name observers to skip, which is how the sync engine applies
//!   remote changes without echoing them back as local edits

mod change;
mod error;
mod object_store;
mod settings;
mod transaction;

pub use change::CollectionChange;
pub use error::{StorageError, StorageResult};
pub use object_store::{ObjectStore, ObservationId, ObservationToken};
pub use settings::{MemorySettings, SettingsStore, SqliteSettings};
pub use transaction::Transaction;
