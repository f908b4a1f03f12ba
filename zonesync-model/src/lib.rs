//! Model reflection for zonesync.
//!
//! Defines the statically declared mapping tables the sync core works from:
//! - [`ModelSchema`]: one model type's primary key, tombstone and fields
//! - [`FieldKind`]: how a field maps onto a remote value
//! - [`SchemaSet`]: a model schema plus the schemas its relationships point at
//! - [`LocalObject`]: a row of the local store, with foreign-key relationships
//!
//! The host application declares schemas once at setup. Validation happens at
//! build time so a broken schema never reaches the sync loop.

mod error;
mod object;
mod schema;

pub use error::{ModelResult, SchemaError};
pub use object::{AssetRef, FieldValue, LocalObject};
pub use schema::{
    FieldDescriptor, FieldKind, ModelSchema, ModelSchemaBuilder, ScalarKind, SchemaSet,
};
pub use zonesync_types::{KeyKind, PrimaryKey};
