use crate::error::{ModelResult, SchemaError};
use crate::object::{FieldValue, LocalObject};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use zonesync_types::KeyKind;

/// Element type of a list field.
///
/// `Location` and `Asset` can be declared but have no remote list
/// representation; the codec skips such fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Int,
    Double,
    String,
    Date,
    Bytes,
    Location,
    Asset,
}

impl ScalarKind {
    /// Whether lists of this element type can be carried by a remote record.
    #[must_use]
    pub fn is_list_syncable(self) -> bool {
        !matches!(self, Self::Location | Self::Asset)
    }
}

/// How a field is stored locally and mapped onto a remote value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Double,
    String,
    Date,
    Bytes,
    /// Embedded coordinate value.
    Location,
    /// Binary payload held by the asset store.
    Asset,
    List { element: ScalarKind },
    /// Single weak reference to a row of `target`.
    ToOne { target: String },
    /// Ordered collection of weak references to rows of `target`.
    ToMany { target: String },
}

impl FieldKind {
    /// The related record type, for relationship fields.
    pub fn relationship_target(&self) -> Option<&str> {
        match self {
            Self::ToOne { target } | Self::ToMany { target } => Some(target),
            _ => None,
        }
    }
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn double(name: &str) -> Self {
        Self::new(name, FieldKind::Double)
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn bytes(name: &str) -> Self {
        Self::new(name, FieldKind::Bytes)
    }

    pub fn location(name: &str) -> Self {
        Self::new(name, FieldKind::Location)
    }

    pub fn asset(name: &str) -> Self {
        Self::new(name, FieldKind::Asset)
    }

    /// Shorthand for a list of scalars.
    pub fn list(name: &str, element: ScalarKind) -> Self {
        Self::new(name, FieldKind::List { element })
    }

    /// Shorthand for a to-one relationship.
    pub fn to_one(name: &str, target: &str) -> Self {
        Self::new(
            name,
            FieldKind::ToOne {
                target: target.into(),
            },
        )
    }

    /// Shorthand for a to-many relationship.
    pub fn to_many(name: &str, target: &str) -> Self {
        Self::new(
            name,
            FieldKind::ToMany {
                target: target.into(),
            },
        )
    }
}

/// Declares one model type's structure for syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    record_type: String,
    primary_key: String,
    key_kind: KeyKind,
    tombstone_field: String,
    fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
    /// Starts declaring a schema for `record_type`.
    pub fn builder(record_type: &str) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            record_type: record_type.into(),
            primary_key: None,
            tombstone_field: None,
            fields: Vec::new(),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Name of the primary-key property.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    pub fn tombstone_field(&self) -> &str {
        &self.tombstone_field
    }

    /// All declared fields in declaration order. The tombstone is included.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Relationship fields only.
    pub fn relationships(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.kind.relationship_target().is_some())
    }

    /// Distinct related record types, in first-declared order.
    pub fn related_types(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.relationships()
            .filter_map(|f| f.kind.relationship_target())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// True when the object's tombstone is set. A missing value counts as live.
    pub fn is_tombstoned(&self, object: &LocalObject) -> bool {
        matches!(object.get(&self.tombstone_field), Some(FieldValue::Bool(true)))
    }
}

/// Builder for [`ModelSchema`]. Validation runs in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ModelSchemaBuilder {
    record_type: String,
    primary_key: Option<(String, KeyKind)>,
    tombstone_field: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl ModelSchemaBuilder {
    #[must_use]
    pub fn primary_key(mut self, name: &str, kind: KeyKind) -> Self {
        self.primary_key = Some((name.into(), kind));
        self
    }

    /// Names the soft-delete flag. A bool field is declared for it unless one
    /// with the same name is added explicitly.
    #[must_use]
    pub fn tombstone(mut self, name: &str) -> Self {
        self.tombstone_field = Some(name.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> ModelResult<ModelSchema> {
        let record_type = self.record_type;
        if record_type.is_empty() {
            return Err(SchemaError::EmptyRecordType);
        }
        let (primary_key, key_kind) =
            self.primary_key
                .ok_or_else(|| SchemaError::MissingPrimaryKey {
                    record_type: record_type.clone(),
                })?;
        let tombstone_field =
            self.tombstone_field
                .ok_or_else(|| SchemaError::MissingTombstone {
                    record_type: record_type.clone(),
                })?;

        let mut fields = self.fields;
        if !fields.iter().any(|f| f.name == tombstone_field) {
            fields.push(FieldDescriptor::bool(&tombstone_field));
        }

        let mut names = HashSet::new();
        for f in &fields {
            if f.name == primary_key {
                return Err(SchemaError::FieldShadowsPrimaryKey {
                    record_type,
                    field: f.name.clone(),
                });
            }
            if !names.insert(f.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    record_type,
                    field: f.name.clone(),
                });
            }
            if f.name == tombstone_field && f.kind != FieldKind::Bool {
                return Err(SchemaError::TombstoneNotBool {
                    record_type,
                    field: f.name.clone(),
                });
            }
        }

        Ok(ModelSchema {
            record_type,
            primary_key,
            key_kind,
            tombstone_field,
            fields,
        })
    }
}

/// A model schema together with the schemas of every type it relates to.
#[derive(Debug, Clone)]
pub struct SchemaSet {
    model: Arc<ModelSchema>,
    related: HashMap<String, Arc<ModelSchema>>,
}

impl SchemaSet {
    /// Bundles `model` with its related schemas and checks that every
    /// relationship target is covered. A model may relate to itself.
    pub fn new(model: ModelSchema, related: Vec<ModelSchema>) -> ModelResult<Self> {
        let related: HashMap<String, Arc<ModelSchema>> = related
            .into_iter()
            .map(|s| (s.record_type.clone(), Arc::new(s)))
            .collect();

        for field in model.relationships() {
            let Some(target) = field.kind.relationship_target() else {
                continue;
            };
            if target != model.record_type && !related.contains_key(target) {
                return Err(SchemaError::UnknownRelatedType {
                    record_type: model.record_type.clone(),
                    field: field.name.clone(),
                    target: target.to_string(),
                });
            }
        }

        Ok(Self {
            model: Arc::new(model),
            related,
        })
    }

    pub fn model(&self) -> &ModelSchema {
        &self.model
    }

    /// Looks up the schema for `record_type`, including the model itself.
    pub fn schema_for(&self, record_type: &str) -> Option<&ModelSchema> {
        if record_type == self.model.record_type {
            Some(&self.model)
        } else {
            self.related.get(record_type).map(Arc::as_ref)
        }
    }
}
