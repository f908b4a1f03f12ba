//! Shared fixtures for sync tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use zonesync_model::{
    FieldDescriptor, FieldValue, KeyKind, LocalObject, ModelSchema, PrimaryKey, ScalarKind,
    SchemaSet,
};
use zonesync_storage::{MemorySettings, ObjectStore};
use zonesync_sync::{PipeToRemote, StaticZones, SyncObject, Syncable};
use zonesync_types::{RecordId, RecordReference, RemoteRecord, RemoteValue, ZoneId};

/// A user with every kind of field, including relationships to itself.
pub fn user_schema() -> ModelSchema {
    ModelSchema::builder("User")
        .primary_key("id", KeyKind::String)
        .tombstone("isDeleted")
        .field(FieldDescriptor::string("name"))
        .field(FieldDescriptor::int("age"))
        .field(FieldDescriptor::double("score"))
        .field(FieldDescriptor::bool("active"))
        .field(FieldDescriptor::date("joined"))
        .field(FieldDescriptor::bytes("thumbnail"))
        .field(FieldDescriptor::location("home"))
        .field(FieldDescriptor::asset("avatar"))
        .field(FieldDescriptor::list("tags", ScalarKind::String))
        .field(FieldDescriptor::list("photos", ScalarKind::Asset))
        .field(FieldDescriptor::to_one("bestFriend", "User"))
        .field(FieldDescriptor::to_many("friends", "User"))
        .build()
        .unwrap()
}

/// A post keyed by integer, pointing at its author.
pub fn post_schema() -> ModelSchema {
    ModelSchema::builder("Post")
        .primary_key("id", KeyKind::Int)
        .tombstone("isDeleted")
        .field(FieldDescriptor::string("title"))
        .field(FieldDescriptor::to_one("author", "User"))
        .build()
        .unwrap()
}

pub fn user_schemas() -> SchemaSet {
    SchemaSet::new(user_schema(), vec![]).unwrap()
}

pub fn post_schemas() -> SchemaSet {
    SchemaSet::new(post_schema(), vec![user_schema()]).unwrap()
}

pub fn zone() -> ZoneId {
    ZoneId::with_default_owner("Main")
}

pub fn key(id: &str) -> PrimaryKey {
    PrimaryKey::from(id)
}

pub fn record_id(id: &str) -> RecordId {
    RecordId::new(id, zone())
}

/// A local user row with a name and a live tombstone.
pub fn user(id: &str, name: &str) -> LocalObject {
    LocalObject::new("User", id)
        .with("name", FieldValue::String(name.into()))
        .with("isDeleted", FieldValue::Bool(false))
}

pub fn tombstoned(object: LocalObject) -> LocalObject {
    object.with("isDeleted", FieldValue::Bool(true))
}

pub fn user_record(id: &str, name: &str) -> RemoteRecord {
    RemoteRecord::new("User", record_id(id))
        .with("name", RemoteValue::String(name.into()))
        .with("isDeleted", RemoteValue::Bool(false))
}

pub fn post_record(id: i64, title: &str) -> RemoteRecord {
    RemoteRecord::new("Post", RecordId::new(id.to_string(), zone()))
        .with("title", RemoteValue::String(title.into()))
}

pub fn reference(id: &str) -> RemoteValue {
    RemoteValue::Reference(RecordReference::weak(record_id(id)))
}

pub fn users(store: &ObjectStore) -> SyncObject {
    SyncObject::builder(user_schemas(), store.clone(), Arc::new(MemorySettings::new()))
        .zones(StaticZones(vec![zone()]))
        .build()
        .unwrap()
}

pub fn posts(store: &ObjectStore) -> SyncObject {
    SyncObject::builder(post_schemas(), store.clone(), Arc::new(MemorySettings::new()))
        .zones(StaticZones(vec![zone()]))
        .build()
        .unwrap()
}

pub fn get(store: &ObjectStore, record_type: &str, key: &PrimaryKey) -> Option<LocalObject> {
    store.read(|txn| txn.get(record_type, key)).unwrap()
}

/// Everything handed to a pipe, one entry per call.
pub type Pushes = Arc<Mutex<Vec<(Vec<RemoteRecord>, Vec<RecordId>)>>>;

pub fn capture_pipe() -> (PipeToRemote, Pushes) {
    let pushes: Pushes = Arc::new(Mutex::new(Vec::new()));
    let sink = pushes.clone();
    let pipe: PipeToRemote = Arc::new(move |records: Vec<RemoteRecord>, deletions: Vec<RecordId>| {
        sink.lock().unwrap().push((records, deletions));
    });
    (pipe, pushes)
}

pub fn capture(object: &dyn Syncable) -> Pushes {
    let (pipe, pushes) = capture_pipe();
    object.set_pipe_to_remote(pipe);
    pushes
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
