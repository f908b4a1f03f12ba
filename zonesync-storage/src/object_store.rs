//! Object store handle, write scopes and observer registry.

use crate::change::CollectionChange;
use crate::error::{StorageError, StorageResult};
use crate::transaction::Transaction;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

/// Identifies one registered observer.
pub type ObservationId = u64;

type Callback = Arc<dyn Fn(&ObjectStore, CollectionChange) + Send + Sync>;

struct Observer {
    record_type: String,
    callback: Callback,
}

#[derive(Default)]
struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<HashMap<ObservationId, Observer>>,
}

impl ObserverRegistry {
    fn remove(&self, id: ObservationId) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn matching(&self, record_type: &str, skip: &[ObservationId]) -> Vec<Callback> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, o)| o.record_type == record_type && !skip.contains(id))
            .map(|(_, o)| o.callback.clone())
            .collect()
    }
}

/// Keeps an observer subscribed. Dropping it unsubscribes.
pub struct ObservationToken {
    id: ObservationId,
    registry: Weak<ObserverRegistry>,
}

impl ObservationToken {
    pub fn id(&self) -> ObservationId {
        self.id
    }
}

impl Drop for ObservationToken {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            debug!("Observer {} unsubscribed", self.id);
        }
    }
}

impl std::fmt::Debug for ObservationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationToken").field("id", &self.id).finish()
    }
}

/// Handle to the local object store.
///
/// Clones share one cached connection and one observer registry, so opening
/// a handle per background task is cheap.
#[derive(Clone)]
pub struct ObjectStore {
    conn: Arc<Mutex<Connection>>,
    observers: Arc<ObserverRegistry>,
}

impl ObjectStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS objects (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                record_type TEXT NOT NULL,
                object_key TEXT NOT NULL,
                data TEXT NOT NULL,
                UNIQUE(record_type, object_key)
            );
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            observers: Arc::new(ObserverRegistry::default()),
        })
    }

    /// Runs `f` in a read scope. Nothing it does is committed.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let txn = Transaction::begin(&mut conn)?;
        f(&txn)
    }

    /// Runs `f` in a write scope, commits, and notifies every observer of
    /// the touched record types. An error from `f` rolls everything back.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.write_without_notifying(&[], f)
    }

    /// Like [`write`](Self::write), but the observers in `skip` are not
    /// told about this commit.
    pub fn write_without_notifying<T>(
        &self,
        skip: &[ObservationId],
        f: impl FnOnce(&mut Transaction<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let (value, changes) = {
            let mut conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let mut txn = Transaction::begin(&mut conn)?;
            let value = f(&mut txn)?;
            (value, txn.commit()?)
        };

        // Delivered with the connection unlocked so callbacks may read.
        for (record_type, change) in changes {
            for callback in self.observers.matching(&record_type, skip) {
                callback(self, change.clone());
            }
        }
        Ok(value)
    }

    /// Subscribes to changes of one record type.
    ///
    /// `callback` first receives [`CollectionChange::Initial`] with the
    /// current contents, then one update per committed write.
    pub fn observe(
        &self,
        record_type: &str,
        callback: impl Fn(&ObjectStore, CollectionChange) + Send + Sync + 'static,
    ) -> StorageResult<ObservationToken> {
        let callback: Callback = Arc::new(callback);
        let initial = self.read(|txn| txn.objects(record_type))?;

        let id = self.observers.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .observers
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(
                id,
                Observer {
                    record_type: record_type.to_string(),
                    callback: callback.clone(),
                },
            );
        debug!("Observer {} subscribed to {}", id, record_type);

        callback(self, CollectionChange::Initial(initial));
        Ok(ObservationToken {
            id,
            registry: Arc::downgrade(&self.observers),
        })
    }

    /// Number of live observers across all record types.
    pub fn observer_count(&self) -> usize {
        self.observers
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
