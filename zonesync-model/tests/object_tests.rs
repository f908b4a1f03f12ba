use zonesync_model::{AssetRef, FieldValue, LocalObject, PrimaryKey};
use zonesync_types::Location;

#[test]
fn typed_getters() {
    let obj = LocalObject::new("User", "u1")
        .with("name", FieldValue::String("Alice".into()))
        .with("age", FieldValue::Int(30))
        .with("active", FieldValue::Bool(true));

    assert_eq!(obj.primary_key(), &PrimaryKey::from("u1"));
    assert_eq!(obj.get_str("name"), Some("Alice"));
    assert_eq!(obj.get_int("age"), Some(30));
    assert_eq!(obj.get_bool("active"), Some(true));
    assert_eq!(obj.get_str("age"), None);
    assert_eq!(obj.get_str("missing"), None);
}

#[test]
fn relationship_accessors() {
    let obj = LocalObject::new("User", "u1")
        .with("best_friend", FieldValue::Reference(Some("u2".into())))
        .with("pets", FieldValue::References(vec![1.into(), 2.into()]))
        .with("rival", FieldValue::Reference(None));

    assert_eq!(obj.reference("best_friend"), Some(&PrimaryKey::from("u2")));
    assert_eq!(obj.reference("rival"), None);
    assert_eq!(obj.references("pets"), &[PrimaryKey::from(1), PrimaryKey::from(2)]);
    assert!(obj.references("friends").is_empty());
}

#[test]
fn assets_collects_every_asset_field() {
    let obj = LocalObject::new("Photo", 1)
        .with("full", FieldValue::Asset(AssetRef::new("a")))
        .with("thumb", FieldValue::Asset(AssetRef::new("b")))
        .with("caption", FieldValue::String("x".into()));
    let mut keys: Vec<_> = obj.assets().into_iter().map(|a| a.key.clone()).collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn generated_asset_keys_are_unique() {
    assert_ne!(AssetRef::generate(), AssetRef::generate());
}

#[test]
fn object_json_round_trip() {
    let obj = LocalObject::new("Place", 7)
        .with("where", FieldValue::Location(Location::new(51.5, -0.12)))
        .with("tags", FieldValue::List(vec![FieldValue::String("a".into())]))
        .with("note", FieldValue::Null);
    let json = serde_json::to_string(&obj).unwrap();
    let back: LocalObject = serde_json::from_str(&json).unwrap();
    assert_eq!(back, obj);
}

#[test]
fn remove_field() {
    let mut obj = LocalObject::new("User", "u1").with("name", FieldValue::String("A".into()));
    assert!(obj.remove("name").is_some());
    assert!(obj.get("name").is_none());
}
