use zonesync_assets::{AssetError, AssetStore, DirectoryAssetStore, MemoryAssetStore};

// ── Error type coverage ─────────────────────────────────────────

#[test]
fn error_display() {
    let err = AssetError::NotFound("k1".to_string());
    assert!(format!("{err}").contains("k1"));

    let err = AssetError::InvalidKey("../etc".to_string());
    assert!(format!("{err}").contains("../etc"));
}

// ── DirectoryAssetStore ─────────────────────────────────────────

#[test]
fn directory_store_read_write_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryAssetStore::open(dir.path().join("assets")).unwrap();

    store.store("0190-abc", b"png bytes").unwrap();
    assert!(store.contains("0190-abc").unwrap());
    assert_eq!(store.read("0190-abc").unwrap(), b"png bytes");

    store.delete("0190-abc").unwrap();
    assert!(!store.contains("0190-abc").unwrap());
}

#[test]
fn directory_store_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryAssetStore::open(dir.path()).unwrap();
    assert!(matches!(store.read("nope"), Err(AssetError::NotFound(_))));
}

#[test]
fn directory_store_delete_missing_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryAssetStore::open(dir.path()).unwrap();
    store.delete("nope").unwrap();
}

#[test]
fn directory_store_rejects_path_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryAssetStore::open(dir.path()).unwrap();
    for key in ["", "../x", "a/b", ".hidden"] {
        assert!(
            matches!(store.store(key, b"x"), Err(AssetError::InvalidKey(_))),
            "key {key:?} should be rejected"
        );
    }
}

// ── MemoryAssetStore ────────────────────────────────────────────

#[test]
fn memory_store_lifecycle() {
    let store = MemoryAssetStore::new();
    assert!(store.is_empty());

    store.store("a", b"1").unwrap();
    store.store("b", b"2").unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.read("a").unwrap(), b"1");

    store.delete("a").unwrap();
    store.delete("a").unwrap();
    assert_eq!(store.len(), 1);
    assert!(matches!(store.read("a"), Err(AssetError::NotFound(_))));
}
