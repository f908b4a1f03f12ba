//! Per-model sync engine for zonesync.
//!
//! Keeps a local object store in step with a zoned remote record store, one
//! model type at a time:
//! - [`RecordCodec`]: converts local objects to remote records and back,
//!   following the model's declared schema
//! - [`PendingRelationshipResolver`]: defers relationships whose targets
//!   have not arrived yet and attaches them once they do
//! - [`LocalChangeObserver`]: turns local edits into records to push and
//!   record IDs to delete
//! - [`TokenStore`]: per-zone cursors and provisioned flags
//! - [`SyncObject`]: the orchestrator implementing [`Syncable`]
//! - [`SyncRegistry`]: routes pulled changes across many model types
//!
//! The engine never talks to the network. A host pull loop feeds it records
//! and a host pusher receives its output through [`PipeToRemote`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zonesync_model::{FieldDescriptor, KeyKind, ModelSchema, SchemaSet};
//! use zonesync_storage::{MemorySettings, ObjectStore};
//! use zonesync_sync::{SyncObject, Syncable};
//! use zonesync_types::{RecordId, RemoteRecord};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let user = ModelSchema::builder("User")
//!     .primary_key("id", KeyKind::String)
//!     .tombstone("isDeleted")
//!     .field(FieldDescriptor::string("name"))
//!     .field(FieldDescriptor::to_one("bestFriend", "User"))
//!     .build()?;
//! let schemas = SchemaSet::new(user, vec![])?;
//!
//! let users = SyncObject::builder(
//!     schemas,
//!     ObjectStore::open_in_memory()?,
//!     Arc::new(MemorySettings::new()),
//! )
//! .build()?;
//!
//! users.set_pipe_to_remote(Arc::new(|records: Vec<RemoteRecord>, deletions: Vec<RecordId>| {
//!     println!("push {} records, delete {}", records.len(), deletions.len());
//! }));
//! users.register_local_changes().await;
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod error;
mod observer;
mod pending;
mod queue;
mod registry;
mod sync_object;
mod syncable;
mod tokens;
mod zones;

pub use codec::{Decoded, RecordCodec};
pub use config::SyncObjectConfig;
pub use error::{CodecError, CodecResult, SyncError, SyncResult};
pub use observer::{LocalChangeObserver, PipeToRemote};
pub use pending::{PendingEntry, PendingRelationshipResolver};
pub use queue::Completion;
pub use registry::SyncRegistry;
pub use sync_object::{SyncObject, SyncObjectBuilder};
pub use syncable::Syncable;
pub use tokens::TokenStore;
pub use zones::{dedup_zones, StaticZones, ZoneResolver};
