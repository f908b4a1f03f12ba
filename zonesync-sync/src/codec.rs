//! Record codec: maps local objects to remote records and back.
//!
//! The mapping is driven entirely by the model's [`SchemaSet`]:
//! - scalars and scalar lists are copied verbatim
//! - locations map onto the native remote location value
//! - assets map onto an [`AssetPointer`]; bytes never enter the record
//! - to-one relationships become a weak reference
//! - to-many relationships become a list of weak references, without
//!   tombstoned or unconvertible targets, and are omitted when empty
//!
//! Decoding resolves relationships against the local store inside the
//! caller's transaction. Targets that are not present yet are returned as
//! [`PendingEntry`]s instead of failing.

use crate::error::{CodecError, CodecResult};
use crate::pending::PendingEntry;
use tracing::{debug, warn};
use zonesync_model::{
    AssetRef, FieldDescriptor, FieldKind, FieldValue, LocalObject, ModelSchema, PrimaryKey,
    ScalarKind, SchemaSet,
};
use zonesync_storage::Transaction;
use zonesync_types::{
    AssetPointer, RecordId, RecordReference, RemoteRecord, RemoteValue, ZoneId,
};

/// The result of decoding one remote record.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The local object to upsert. Every schema field is populated.
    pub object: LocalObject,
    /// Relationships whose targets are not yet stored locally.
    pub pending: Vec<PendingEntry>,
}

/// Stateless, schema-driven converter for one model type.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    schemas: SchemaSet,
}

impl RecordCodec {
    pub fn new(schemas: SchemaSet) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    pub fn model(&self) -> &ModelSchema {
        self.schemas.model()
    }

    /// The record ID an object maps onto within `zone`.
    pub fn record_id(&self, object: &LocalObject, zone: &ZoneId) -> CodecResult<RecordId> {
        Ok(RecordId::for_key(object.primary_key(), zone.clone())?)
    }

    /// Serializes `object` into a record in `zone`.
    ///
    /// `txn` is used to drop to-many targets that are tombstoned or gone.
    pub fn to_record(
        &self,
        object: &LocalObject,
        zone: &ZoneId,
        txn: &Transaction<'_>,
    ) -> CodecResult<RemoteRecord> {
        let model = self.model();
        if object.record_type() != model.record_type() {
            return Err(CodecError::RecordTypeMismatch {
                expected: model.record_type().to_string(),
                found: object.record_type().to_string(),
            });
        }

        let mut record = RemoteRecord::new(model.record_type(), self.record_id(object, zone)?);
        for field in model.fields() {
            let Some(value) = object.get(&field.name) else {
                continue;
            };
            if let Some(remote) = self.encode_field(field, value, zone, txn)? {
                record.set(field.name.clone(), remote);
            }
        }
        Ok(record)
    }

    /// Deserializes `record` into a local object, resolving relationships
    /// against what `txn` can see.
    ///
    /// Unsupported list fields keep the value already stored locally.
    pub fn from_record(
        &self,
        record: &RemoteRecord,
        txn: &Transaction<'_>,
    ) -> CodecResult<Decoded> {
        let model = self.model();
        if record.record_type() != model.record_type() {
            return Err(CodecError::RecordTypeMismatch {
                expected: model.record_type().to_string(),
                found: record.record_type().to_string(),
            });
        }

        let key = record.record_id().primary_key(model.key_kind())?;
        let existing = txn.get(model.record_type(), &key)?;
        let mut object = LocalObject::new(model.record_type(), key.clone());
        let mut pending = Vec::new();

        for field in model.fields() {
            let remote = record.get(&field.name);
            let value = match &field.kind {
                FieldKind::List { element } if !element.is_list_syncable() => existing
                    .as_ref()
                    .and_then(|o| o.get(&field.name))
                    .cloned()
                    .unwrap_or(FieldValue::Null),
                FieldKind::List { element } => match remote {
                    None => FieldValue::Null,
                    Some(RemoteValue::List(items)) => FieldValue::List(
                        items
                            .iter()
                            .map(|v| {
                                decode_scalar(*element, v)
                                    .ok_or_else(|| remote_mismatch(field, v))
                            })
                            .collect::<CodecResult<_>>()?,
                    ),
                    Some(other) => return Err(remote_mismatch(field, other)),
                },
                FieldKind::ToOne { target } => match remote {
                    None => FieldValue::Reference(None),
                    Some(v) => {
                        let target_key = self.decode_reference(field, target, v)?;
                        if self.target_present(target, &target_key, &key, txn)? {
                            FieldValue::Reference(Some(target_key))
                        } else {
                            pending.push(PendingEntry::new(&key, &field.name, target, target_key));
                            FieldValue::Reference(None)
                        }
                    }
                },
                FieldKind::ToMany { target } => match remote {
                    None => FieldValue::References(Vec::new()),
                    Some(RemoteValue::List(items)) => {
                        let mut keys = Vec::new();
                        for item in items {
                            let target_key = self.decode_reference(field, target, item)?;
                            if self.target_present(target, &target_key, &key, txn)? {
                                keys.push(target_key);
                            } else {
                                pending.push(PendingEntry::new(
                                    &key,
                                    &field.name,
                                    target,
                                    target_key,
                                ));
                            }
                        }
                        FieldValue::References(keys)
                    }
                    Some(other) => return Err(remote_mismatch(field, other)),
                },
                kind => match remote {
                    None => FieldValue::Null,
                    Some(v) => scalar_kind(kind)
                        .and_then(|k| decode_scalar(k, v))
                        .ok_or_else(|| remote_mismatch(field, v))?,
                },
            };
            object.set(field.name.clone(), value);
        }

        for name in record.fields().keys() {
            if model.field(name).is_none() {
                debug!("Ignoring unknown field {} on {}", name, record.record_id());
            }
        }

        Ok(Decoded { object, pending })
    }

    fn encode_field(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        zone: &ZoneId,
        txn: &Transaction<'_>,
    ) -> CodecResult<Option<RemoteValue>> {
        if matches!(value, FieldValue::Null) {
            return Ok(None);
        }

        let remote = match (&field.kind, value) {
            (FieldKind::List { element }, FieldValue::List(items)) => {
                if !element.is_list_syncable() {
                    warn!(
                        "Skipping field {}.{}: lists of {:?} are not supported remotely",
                        self.model().record_type(),
                        field.name,
                        element
                    );
                    return Ok(None);
                }
                let items = items
                    .iter()
                    .map(|v| encode_scalar(*element, v).ok_or_else(|| local_mismatch(field, v)))
                    .collect::<CodecResult<Vec<_>>>()?;
                RemoteValue::List(items)
            }
            (FieldKind::ToOne { .. }, FieldValue::Reference(key)) => {
                let Some(key) = key else {
                    return Ok(None);
                };
                match RecordId::for_key(key, zone.clone()) {
                    Ok(id) => RemoteValue::Reference(RecordReference::weak(id)),
                    Err(e) => {
                        warn!(
                            "Dropping reference {}.{}: {}",
                            self.model().record_type(),
                            field.name,
                            e
                        );
                        return Ok(None);
                    }
                }
            }
            (FieldKind::ToMany { target }, FieldValue::References(keys)) => {
                let target_schema = self.related(field, target)?;
                let mut refs = Vec::new();
                for key in keys {
                    let live = txn
                        .get(target, key)?
                        .is_some_and(|t| !target_schema.is_tombstoned(&t));
                    if !live {
                        debug!(
                            "Dropping {}.{} element {}: target deleted",
                            self.model().record_type(),
                            field.name,
                            key
                        );
                        continue;
                    }
                    match RecordId::for_key(key, zone.clone()) {
                        Ok(id) => refs.push(RemoteValue::Reference(RecordReference::weak(id))),
                        Err(e) => warn!(
                            "Dropping {}.{} element: {}",
                            self.model().record_type(),
                            field.name,
                            e
                        ),
                    }
                }
                if refs.is_empty() {
                    return Ok(None);
                }
                RemoteValue::List(refs)
            }
            (kind, value) => scalar_kind(kind)
                .and_then(|k| encode_scalar(k, value))
                .ok_or_else(|| local_mismatch(field, value))?,
        };
        Ok(Some(remote))
    }

    fn related(&self, field: &FieldDescriptor, target: &str) -> CodecResult<&ModelSchema> {
        self.schemas
            .schema_for(target)
            .ok_or_else(|| CodecError::UnknownRelatedType {
                field: field.name.clone(),
                target: target.to_string(),
            })
    }

    fn decode_reference(
        &self,
        field: &FieldDescriptor,
        target: &str,
        value: &RemoteValue,
    ) -> CodecResult<PrimaryKey> {
        let RemoteValue::Reference(reference) = value else {
            return Err(remote_mismatch(field, value));
        };
        let schema = self.related(field, target)?;
        Ok(reference.record_id.primary_key(schema.key_kind())?)
    }

    /// A row referencing itself counts as present before it is written.
    fn target_present(
        &self,
        target: &str,
        target_key: &PrimaryKey,
        owner_key: &PrimaryKey,
        txn: &Transaction<'_>,
    ) -> CodecResult<bool> {
        if target == self.model().record_type() && target_key == owner_key {
            return Ok(true);
        }
        Ok(txn.contains(target, target_key)?)
    }
}

fn scalar_kind(kind: &FieldKind) -> Option<ScalarKind> {
    Some(match kind {
        FieldKind::Bool => ScalarKind::Bool,
        FieldKind::Int => ScalarKind::Int,
        FieldKind::Double => ScalarKind::Double,
        FieldKind::String => ScalarKind::String,
        FieldKind::Date => ScalarKind::Date,
        FieldKind::Bytes => ScalarKind::Bytes,
        FieldKind::Location => ScalarKind::Location,
        FieldKind::Asset => ScalarKind::Asset,
        FieldKind::List { .. } | FieldKind::ToOne { .. } | FieldKind::ToMany { .. } => return None,
    })
}

fn encode_scalar(kind: ScalarKind, value: &FieldValue) -> Option<RemoteValue> {
    Some(match (kind, value) {
        (ScalarKind::Bool, FieldValue::Bool(v)) => RemoteValue::Bool(*v),
        (ScalarKind::Int, FieldValue::Int(v)) => RemoteValue::Int(*v),
        (ScalarKind::Double, FieldValue::Double(v)) => RemoteValue::Double(*v),
        (ScalarKind::String, FieldValue::String(v)) => RemoteValue::String(v.clone()),
        (ScalarKind::Date, FieldValue::Date(v)) => RemoteValue::Date(*v),
        (ScalarKind::Bytes, FieldValue::Bytes(v)) => RemoteValue::Bytes(v.clone()),
        (ScalarKind::Location, FieldValue::Location(v)) => RemoteValue::Location(*v),
        (ScalarKind::Asset, FieldValue::Asset(a)) => RemoteValue::Asset(AssetPointer {
            key: a.key.clone(),
        }),
        _ => return None,
    })
}

fn decode_scalar(kind: ScalarKind, value: &RemoteValue) -> Option<FieldValue> {
    Some(match (kind, value) {
        (ScalarKind::Bool, RemoteValue::Bool(v)) => FieldValue::Bool(*v),
        (ScalarKind::Int, RemoteValue::Int(v)) => FieldValue::Int(*v),
        (ScalarKind::Double, RemoteValue::Double(v)) => FieldValue::Double(*v),
        (ScalarKind::String, RemoteValue::String(v)) => FieldValue::String(v.clone()),
        (ScalarKind::Date, RemoteValue::Date(v)) => FieldValue::Date(*v),
        (ScalarKind::Bytes, RemoteValue::Bytes(v)) => FieldValue::Bytes(v.clone()),
        (ScalarKind::Location, RemoteValue::Location(v)) => FieldValue::Location(*v),
        (ScalarKind::Asset, RemoteValue::Asset(p)) => FieldValue::Asset(AssetRef::new(&p.key)),
        _ => return None,
    })
}

fn local_type_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Bool(_) => "bool",
        FieldValue::Int(_) => "int",
        FieldValue::Double(_) => "double",
        FieldValue::String(_) => "string",
        FieldValue::Date(_) => "date",
        FieldValue::Bytes(_) => "bytes",
        FieldValue::Location(_) => "location",
        FieldValue::Asset(_) => "asset",
        FieldValue::List(_) => "list",
        FieldValue::Reference(_) => "reference",
        FieldValue::References(_) => "references",
    }
}

fn local_mismatch(field: &FieldDescriptor, value: &FieldValue) -> CodecError {
    CodecError::FieldTypeMismatch {
        field: field.name.clone(),
        expected: format!("{:?}", field.kind),
        found: local_type_name(value),
    }
}

fn remote_mismatch(field: &FieldDescriptor, value: &RemoteValue) -> CodecError {
    CodecError::FieldTypeMismatch {
        field: field.name.clone(),
        expected: format!("{:?}", field.kind),
        found: value.type_name(),
    }
}
