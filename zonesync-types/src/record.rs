//! Remote record types.
//!
//! A [`RemoteRecord`] is the wire-independent shape of one row in the remote
//! store: a record type, an immutable identifier and a field map. Transports
//! translate it to and from their own representation.

use crate::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A geographic coordinate, stored natively by both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Pointer to a binary payload that travels out of band.
///
/// The record never carries the bytes themselves. The pusher and puller move
/// the payload through the asset store using `key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPointer {
    pub key: String,
}

/// What happens to the referencing record when the target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAction {
    /// Weak reference: no cascading delete.
    None,
}

/// A typed reference to another record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordReference {
    pub record_id: RecordId,
    pub action: ReferenceAction,
}

impl RecordReference {
    /// Creates a weak reference (no cascading action).
    pub fn weak(record_id: RecordId) -> Self {
        Self {
            record_id,
            action: ReferenceAction::None,
        }
    }
}

/// A single field value in a remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RemoteValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    Location(Location),
    Asset(AssetPointer),
    Reference(RecordReference),
    List(Vec<RemoteValue>),
}

impl RemoteValue {
    /// Short name of the variant, for log lines and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Bytes(_) => "bytes",
            Self::Location(_) => "location",
            Self::Asset(_) => "asset",
            Self::Reference(_) => "reference",
            Self::List(_) => "list",
        }
    }
}

/// A named, typed, zoned record in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    record_type: String,
    record_id: RecordId,
    fields: BTreeMap<String, RemoteValue>,
}

impl RemoteRecord {
    /// Creates an empty record.
    pub fn new(record_type: impl Into<String>, record_id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            record_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn get(&self, field: &str) -> Option<&RemoteValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: RemoteValue) {
        self.fields.insert(field.into(), value);
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: RemoteValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<RemoteValue> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, RemoteValue> {
        &self.fields
    }
}
