//! Persisted key-value settings used for sync cursors and zone flags.
//!
//! Values are opaque byte strings; booleans are stored as a single byte.

use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Key-value storage injected into the token store.
pub trait SettingsStore: Send + Sync {
    /// Reads a raw value.
    fn bytes(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes a raw value, replacing any previous one.
    fn set_bytes(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Reads a boolean value.
    fn bool(&self, key: &str) -> StorageResult<Option<bool>> {
        self.bytes(key)?.map(|raw| decode_bool(key, &raw)).transpose()
    }

    /// Writes a boolean value.
    fn set_bool(&self, key: &str, value: bool) -> StorageResult<()> {
        self.set_bytes(key, &[u8::from(value)])
    }
}

fn decode_bool(key: &str, raw: &[u8]) -> StorageResult<bool> {
    match raw {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(StorageError::InvalidData(format!(
            "setting {key} is not a bool ({} bytes)",
            raw.len()
        ))),
    }
}

/// Settings persisted in a SQLite table.
pub struct SqliteSettings {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSettings {
    /// Opens (or creates) a settings store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory settings store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl SettingsStore for SqliteSettings {
    fn bytes(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_bytes(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM settings WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

/// Settings held in process memory.
#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.values.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl SettingsStore for MemorySettings {
    fn bytes(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_bytes(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
