mod common;

use chrono::{DateTime, Utc};
use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use zonesync_model::{AssetRef, FieldValue, LocalObject, PrimaryKey};
use zonesync_storage::ObjectStore;
use zonesync_sync::{CodecError, RecordCodec};
use zonesync_types::{
    AssetPointer, Location, RecordId, RecordReference, RemoteRecord, RemoteValue, ZoneId,
};

fn codec() -> RecordCodec {
    RecordCodec::new(user_schemas())
}

fn encode(store: &ObjectStore, object: &LocalObject) -> Result<RemoteRecord, CodecError> {
    store.read(|txn| Ok(codec().to_record(object, &zone(), txn))).unwrap()
}

fn decode(store: &ObjectStore, record: &RemoteRecord) -> Result<zonesync_sync::Decoded, CodecError> {
    store.read(|txn| Ok(codec().from_record(record, txn))).unwrap()
}

fn seed(store: &ObjectStore, objects: &[LocalObject]) {
    store
        .write(|txn| {
            for o in objects {
                txn.upsert(o)?;
            }
            Ok(())
        })
        .unwrap();
}

fn date(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

// ── to_record ────────────────────────────────────────────────────

#[test]
fn scalars_map_verbatim() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("u1", "Alice")
        .with("age", FieldValue::Int(31))
        .with("score", FieldValue::Double(4.5))
        .with("active", FieldValue::Bool(true))
        .with("joined", FieldValue::Date(date(1_700_000_000)))
        .with("thumbnail", FieldValue::Bytes(vec![1, 2, 3]))
        .with("home", FieldValue::Location(Location::new(48.85, 2.35)))
        .with("avatar", FieldValue::Asset(AssetRef::new("a-1")));

    let record = encode(&store, &object).unwrap();

    assert_eq!(record.record_type(), "User");
    assert_eq!(record.record_id(), &RecordId::new("u1", zone()));
    assert_eq!(record.get("name"), Some(&RemoteValue::String("Alice".into())));
    assert_eq!(record.get("age"), Some(&RemoteValue::Int(31)));
    assert_eq!(record.get("score"), Some(&RemoteValue::Double(4.5)));
    assert_eq!(record.get("active"), Some(&RemoteValue::Bool(true)));
    assert_eq!(record.get("joined"), Some(&RemoteValue::Date(date(1_700_000_000))));
    assert_eq!(record.get("thumbnail"), Some(&RemoteValue::Bytes(vec![1, 2, 3])));
    assert_eq!(
        record.get("home"),
        Some(&RemoteValue::Location(Location::new(48.85, 2.35)))
    );
    assert_eq!(
        record.get("avatar"),
        Some(&RemoteValue::Asset(AssetPointer { key: "a-1".into() }))
    );
    assert_eq!(record.get("isDeleted"), Some(&RemoteValue::Bool(false)));
}

#[test]
fn null_and_unset_fields_are_omitted() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("u1", "Alice").with("age", FieldValue::Null);

    let record = encode(&store, &object).unwrap();

    assert!(record.get("age").is_none());
    assert!(record.get("score").is_none());
    assert!(record.get("bestFriend").is_none());
}

#[test]
fn scalar_lists_are_copied() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("u1", "Alice").with(
        "tags",
        FieldValue::List(vec![
            FieldValue::String("a".into()),
            FieldValue::String("b".into()),
        ]),
    );

    let record = encode(&store, &object).unwrap();

    assert_eq!(
        record.get("tags"),
        Some(&RemoteValue::List(vec![
            RemoteValue::String("a".into()),
            RemoteValue::String("b".into()),
        ]))
    );
}

#[test]
fn unsupported_list_is_skipped() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("u1", "Alice").with(
        "photos",
        FieldValue::List(vec![FieldValue::Asset(AssetRef::new("p-1"))]),
    );

    let record = encode(&store, &object).unwrap();

    assert!(record.get("photos").is_none());
    assert!(record.get("name").is_some());
}

#[test]
fn to_one_becomes_weak_reference_in_same_zone() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("u1", "Alice").with("bestFriend", FieldValue::Reference(Some(key("u2"))));

    let record = encode(&store, &object).unwrap();

    assert_eq!(record.get("bestFriend"), Some(&reference("u2")));
}

#[test]
fn to_many_drops_tombstoned_and_missing_targets() {
    let store = ObjectStore::open_in_memory().unwrap();
    seed(
        &store,
        &[user("u2", "Bob"), tombstoned(user("u3", "Carol"))],
    );
    let object = user("u1", "Alice").with(
        "friends",
        FieldValue::References(vec![key("u2"), key("u3"), key("u4")]),
    );

    let record = encode(&store, &object).unwrap();

    assert_eq!(record.get("friends"), Some(&RemoteValue::List(vec![reference("u2")])));
}

#[test]
fn empty_to_many_is_omitted() {
    let store = ObjectStore::open_in_memory().unwrap();
    seed(&store, &[tombstoned(user("u3", "Carol"))]);
    let object = user("u1", "Alice").with("friends", FieldValue::References(vec![key("u3")]));

    let record = encode(&store, &object).unwrap();

    assert!(record.get("friends").is_none());
}

#[test]
fn scalar_type_mismatch_is_an_error() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("u1", "Alice").with("age", FieldValue::String("old".into()));

    let err = encode(&store, &object).unwrap_err();

    assert!(matches!(err, CodecError::FieldTypeMismatch { ref field, found: "string", .. } if field == "age"));
}

#[test]
fn invalid_record_name_is_an_error() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = user("_hidden", "Alice");

    let err = encode(&store, &object).unwrap_err();

    assert!(matches!(err, CodecError::InvalidIdentifier(_)));
}

#[test]
fn wrong_record_type_is_rejected() {
    let store = ObjectStore::open_in_memory().unwrap();
    let object = LocalObject::new("Post", 1i64);

    let err = encode(&store, &object).unwrap_err();

    assert!(matches!(err, CodecError::RecordTypeMismatch { .. }));
}

// ── from_record ──────────────────────────────────────────────────

#[test]
fn every_schema_field_is_populated() {
    let store = ObjectStore::open_in_memory().unwrap();

    let decoded = decode(&store, &user_record("u1", "Alice")).unwrap();
    let object = decoded.object;

    assert_eq!(object.primary_key(), &key("u1"));
    assert_eq!(object.get_str("name"), Some("Alice"));
    assert_eq!(object.get("age"), Some(&FieldValue::Null));
    assert_eq!(object.get("tags"), Some(&FieldValue::Null));
    assert_eq!(object.get("bestFriend"), Some(&FieldValue::Reference(None)));
    assert_eq!(object.get("friends"), Some(&FieldValue::References(vec![])));
    assert!(decoded.pending.is_empty());
}

#[test]
fn present_target_is_attached() {
    let store = ObjectStore::open_in_memory().unwrap();
    seed(&store, &[user("u2", "Bob")]);
    let record = user_record("u1", "Alice").with("bestFriend", reference("u2"));

    let decoded = decode(&store, &record).unwrap();

    assert_eq!(decoded.object.reference("bestFriend"), Some(&key("u2")));
    assert!(decoded.pending.is_empty());
}

#[test]
fn missing_target_becomes_pending() {
    let store = ObjectStore::open_in_memory().unwrap();
    let record = user_record("u1", "Alice").with("bestFriend", reference("u2"));

    let decoded = decode(&store, &record).unwrap();

    assert_eq!(decoded.object.reference("bestFriend"), None);
    assert_eq!(decoded.pending.len(), 1);
    let entry = &decoded.pending[0];
    assert_eq!(entry.owner, key("u1"));
    assert_eq!(entry.field, "bestFriend");
    assert_eq!(entry.target_type, "User");
    assert_eq!(entry.target, key("u2"));
}

#[test]
fn self_reference_resolves_immediately() {
    let store = ObjectStore::open_in_memory().unwrap();
    let record = user_record("u1", "Alice").with("bestFriend", reference("u1"));

    let decoded = decode(&store, &record).unwrap();

    assert_eq!(decoded.object.reference("bestFriend"), Some(&key("u1")));
    assert!(decoded.pending.is_empty());
}

#[test]
fn to_many_splits_present_and_pending() {
    let store = ObjectStore::open_in_memory().unwrap();
    seed(&store, &[user("u2", "Bob")]);
    let record = user_record("u1", "Alice").with(
        "friends",
        RemoteValue::List(vec![reference("u2"), reference("u3")]),
    );

    let decoded = decode(&store, &record).unwrap();

    assert_eq!(decoded.object.references("friends"), &[key("u2")]);
    assert_eq!(decoded.pending.len(), 1);
    assert_eq!(decoded.pending[0].target, key("u3"));
}

#[test]
fn unsupported_list_keeps_local_value() {
    let store = ObjectStore::open_in_memory().unwrap();
    let photos = FieldValue::List(vec![FieldValue::Asset(AssetRef::new("p-1"))]);
    seed(&store, &[user("u1", "Alice").with("photos", photos.clone())]);

    let decoded = decode(&store, &user_record("u1", "Alicia")).unwrap();

    assert_eq!(decoded.object.get("photos"), Some(&photos));
    assert_eq!(decoded.object.get_str("name"), Some("Alicia"));
}

#[test]
fn unknown_remote_fields_are_ignored() {
    let store = ObjectStore::open_in_memory().unwrap();
    let record = user_record("u1", "Alice").with("nickname", RemoteValue::String("Al".into()));

    let decoded = decode(&store, &record).unwrap();

    assert!(decoded.object.get("nickname").is_none());
}

#[test]
fn remote_type_mismatch_is_an_error() {
    let store = ObjectStore::open_in_memory().unwrap();
    let record = user_record("u1", "Alice").with("age", RemoteValue::String("old".into()));

    let err = decode(&store, &record).unwrap_err();

    assert!(matches!(err, CodecError::FieldTypeMismatch { found: "string", .. }));
}

#[test]
fn integer_keys_parse_from_record_name() {
    let store = ObjectStore::open_in_memory().unwrap();
    let codec = RecordCodec::new(post_schemas());
    let record = post_record(42, "Hello");

    let decoded = store.read(|txn| Ok(codec.from_record(&record, txn))).unwrap().unwrap();

    assert_eq!(decoded.object.primary_key(), &PrimaryKey::Int(42));
}

#[test]
fn non_numeric_name_for_integer_key_is_an_error() {
    let store = ObjectStore::open_in_memory().unwrap();
    let codec = RecordCodec::new(post_schemas());
    let record = RemoteRecord::new("Post", RecordId::new("abc", zone()));

    let err = store.read(|txn| Ok(codec.from_record(&record, txn))).unwrap().unwrap_err();

    assert!(matches!(err, CodecError::InvalidIdentifier(_)));
}

#[test]
fn foreign_zone_reference_still_resolves_by_key() {
    let store = ObjectStore::open_in_memory().unwrap();
    seed(&store, &[user("u2", "Bob")]);
    let other = RecordId::new("u2", ZoneId::new("Other", "someone"));
    let record = user_record("u1", "Alice")
        .with("bestFriend", RemoteValue::Reference(RecordReference::weak(other)));

    let decoded = decode(&store, &record).unwrap();

    assert_eq!(decoded.object.reference("bestFriend"), Some(&key("u2")));
}

// ── Round trip ───────────────────────────────────────────────────

fn full_user(
    id: String,
    name: String,
    age: i64,
    score: f64,
    active: bool,
    joined: i64,
    tags: Vec<String>,
) -> LocalObject {
    LocalObject::new("User", id.as_str())
        .with("name", FieldValue::String(name))
        .with("age", FieldValue::Int(age))
        .with("score", FieldValue::Double(score))
        .with("active", FieldValue::Bool(active))
        .with("joined", FieldValue::Date(date(joined)))
        .with("thumbnail", FieldValue::Bytes(id.clone().into_bytes()))
        .with("home", FieldValue::Location(Location::new(score, -score)))
        .with("avatar", FieldValue::Asset(AssetRef::new(format!("a-{id}"))))
        .with(
            "tags",
            FieldValue::List(tags.into_iter().map(FieldValue::String).collect()),
        )
        .with("photos", FieldValue::Null)
        .with("bestFriend", FieldValue::Reference(Some(PrimaryKey::from(id.as_str()))))
        .with("friends", FieldValue::References(vec![]))
        .with("isDeleted", FieldValue::Bool(false))
}

proptest! {
    #[test]
    fn decode_inverts_encode(
        id in "[a-z0-9][a-z0-9-]{0,20}",
        name in ".{0,40}",
        age in any::<i64>(),
        score in -1.0e6f64..1.0e6,
        active in any::<bool>(),
        joined in 0i64..4_000_000_000,
        tags in proptest::collection::vec("[a-z]{1,8}", 0..5),
    ) {
        let store = ObjectStore::open_in_memory().unwrap();
        let original = full_user(id, name, age, score, active, joined, tags);

        let record = encode(&store, &original).unwrap();
        let decoded = decode(&store, &record).unwrap();

        prop_assert_eq!(decoded.object, original);
        prop_assert!(decoded.pending.is_empty());
    }
}
