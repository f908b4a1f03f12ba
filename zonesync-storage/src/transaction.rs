//! Transaction scope over the object table.

use crate::change::CollectionChange;
use crate::error::StorageResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use zonesync_model::{LocalObject, PrimaryKey};

/// One `(seq, object)` row in insertion order.
type Row = (i64, LocalObject);

/// An open transaction on the object store.
///
/// Reads see the transaction's own uncommitted writes. Dropping the
/// transaction without committing rolls it back.
pub struct Transaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
    /// Ordering of each record type before its first mutation in this scope.
    before: HashMap<String, Vec<(i64, PrimaryKey)>>,
    /// Keys mutated per record type, in first-touch order.
    touched: HashMap<String, Vec<PrimaryKey>>,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn begin(conn: &'conn mut Connection) -> StorageResult<Self> {
        Ok(Self {
            tx: conn.transaction()?,
            before: HashMap::new(),
            touched: HashMap::new(),
        })
    }

    /// Fetches one object by primary key.
    pub fn get(&self, record_type: &str, key: &PrimaryKey) -> StorageResult<Option<LocalObject>> {
        let data: Option<String> = self
            .tx
            .query_row(
                "SELECT data FROM objects WHERE record_type = ?1 AND object_key = ?2",
                params![record_type, key.storage_key()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Returns true if an object with this key exists.
    pub fn contains(&self, record_type: &str, key: &PrimaryKey) -> StorageResult<bool> {
        let found: Option<i64> = self
            .tx
            .query_row(
                "SELECT seq FROM objects WHERE record_type = ?1 AND object_key = ?2",
                params![record_type, key.storage_key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// All objects of a record type, in insertion order.
    pub fn objects(&self, record_type: &str) -> StorageResult<Vec<LocalObject>> {
        Ok(self.rows(record_type)?.into_iter().map(|(_, o)| o).collect())
    }

    /// Number of objects of a record type.
    pub fn count(&self, record_type: &str) -> StorageResult<usize> {
        let n: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM objects WHERE record_type = ?1",
            params![record_type],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Inserts the object, or replaces the stored one with the same key.
    /// Replacing keeps the object's position in the collection.
    pub fn upsert(&mut self, object: &LocalObject) -> StorageResult<()> {
        let record_type = object.record_type();
        self.snapshot_before(record_type)?;
        let data = serde_json::to_string(object)?;
        self.tx.execute(
            "INSERT INTO objects (record_type, object_key, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(record_type, object_key) DO UPDATE SET data = excluded.data",
            params![record_type, object.primary_key().storage_key(), data],
        )?;
        self.touch(record_type, object.primary_key());
        Ok(())
    }

    /// Deletes an object. Returns false if it did not exist.
    pub fn delete(&mut self, record_type: &str, key: &PrimaryKey) -> StorageResult<bool> {
        self.snapshot_before(record_type)?;
        let n = self.tx.execute(
            "DELETE FROM objects WHERE record_type = ?1 AND object_key = ?2",
            params![record_type, key.storage_key()],
        )?;
        if n > 0 {
            self.touch(record_type, key);
        }
        Ok(n > 0)
    }

    /// Computes the change sets for every touched record type, then commits.
    pub(crate) fn commit(self) -> StorageResult<Vec<(String, CollectionChange)>> {
        let changes = self.collect_changes()?;
        self.tx.commit()?;
        Ok(changes)
    }

    fn rows(&self, record_type: &str) -> StorageResult<Vec<Row>> {
        let mut stmt = self
            .tx
            .prepare("SELECT seq, data FROM objects WHERE record_type = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![record_type], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (seq, json) = row?;
            result.push((seq, serde_json::from_str(&json)?));
        }
        Ok(result)
    }

    fn snapshot_before(&mut self, record_type: &str) -> StorageResult<()> {
        if self.before.contains_key(record_type) {
            return Ok(());
        }
        let ordering = self
            .rows(record_type)?
            .into_iter()
            .map(|(seq, o)| (seq, o.primary_key().clone()))
            .collect();
        self.before.insert(record_type.to_string(), ordering);
        Ok(())
    }

    fn touch(&mut self, record_type: &str, key: &PrimaryKey) {
        let keys = self.touched.entry(record_type.to_string()).or_default();
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }

    fn collect_changes(&self) -> StorageResult<Vec<(String, CollectionChange)>> {
        let mut changes = Vec::new();

        for (record_type, keys) in &self.touched {
            let after = self.rows(record_type)?;
            let old_pos: HashMap<&PrimaryKey, (usize, i64)> = self
                .before
                .get(record_type)
                .map(|rows| {
                    rows.iter()
                        .enumerate()
                        .map(|(i, (seq, key))| (key, (i, *seq)))
                        .collect()
                })
                .unwrap_or_default();
            let new_pos: HashMap<&PrimaryKey, (usize, i64)> = after
                .iter()
                .enumerate()
                .map(|(i, (seq, o))| (o.primary_key(), (i, *seq)))
                .collect();

            let mut deletions = Vec::new();
            let mut insertions = Vec::new();
            let mut modifications = Vec::new();

            for key in keys {
                match (old_pos.get(key), new_pos.get(key)) {
                    (Some(&(_, old_seq)), Some(&(new_idx, new_seq))) if old_seq == new_seq => {
                        modifications.push(new_idx);
                    }
                    // Deleted and re-inserted within the same scope.
                    (Some(&(old_idx, _)), Some(&(new_idx, _))) => {
                        deletions.push(old_idx);
                        insertions.push(new_idx);
                    }
                    (Some(&(old_idx, _)), None) => deletions.push(old_idx),
                    (None, Some(&(new_idx, _))) => insertions.push(new_idx),
                    (None, None) => {}
                }
            }

            if deletions.is_empty() && insertions.is_empty() && modifications.is_empty() {
                continue;
            }
            deletions.sort_unstable();
            insertions.sort_unstable();
            modifications.sort_unstable();

            changes.push((
                record_type.clone(),
                CollectionChange::Update {
                    results: after.into_iter().map(|(_, o)| o).collect(),
                    deletions,
                    insertions,
                    modifications,
                },
            ));
        }

        Ok(changes)
    }
}
