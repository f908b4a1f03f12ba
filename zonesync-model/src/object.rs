use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use zonesync_types::{Location, PrimaryKey};

/// Local handle to a binary payload kept by the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub key: String,
}

impl AssetRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Creates a handle with a fresh, time-ordered key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: Uuid::now_v7().to_string(),
        }
    }
}

/// A field value of a local object.
///
/// Relationships are stored as foreign keys and are only set once the target
/// row exists locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    Location(Location),
    Asset(AssetRef),
    List(Vec<FieldValue>),
    Reference(Option<PrimaryKey>),
    References(Vec<PrimaryKey>),
}

/// A row of the local object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalObject {
    record_type: String,
    primary_key: PrimaryKey,
    fields: BTreeMap<String, FieldValue>,
}

impl LocalObject {
    pub fn new(record_type: impl Into<String>, primary_key: impl Into<PrimaryKey>) -> Self {
        Self {
            record_type: record_type.into(),
            primary_key: primary_key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Extract a string value.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Extract a boolean value.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.fields.get(field) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer value.
    pub fn get_int(&self, field: &str) -> Option<i64> {
        match self.fields.get(field) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// The target key of a to-one relationship, if attached.
    pub fn reference(&self, field: &str) -> Option<&PrimaryKey> {
        match self.fields.get(field) {
            Some(FieldValue::Reference(Some(key))) => Some(key),
            _ => None,
        }
    }

    /// The target keys of a to-many relationship. Empty when unset.
    pub fn references(&self, field: &str) -> &[PrimaryKey] {
        match self.fields.get(field) {
            Some(FieldValue::References(keys)) => keys,
            _ => &[],
        }
    }

    /// Every asset handle held by this object, across all fields.
    pub fn assets(&self) -> Vec<&AssetRef> {
        self.fields
            .values()
            .filter_map(|v| match v {
                FieldValue::Asset(a) => Some(a),
                _ => None,
            })
            .collect()
    }
}
