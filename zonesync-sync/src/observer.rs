//! Local change observation.
//!
//! Turns the store's index-based change sets into records to push and record
//! IDs to delete, and hands both to the host's pipe.

use crate::codec::RecordCodec;
use crate::error::CodecError;
use crate::pending::PendingRelationshipResolver;
use crate::zones::ZoneResolver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tracing::{debug, warn};
use zonesync_model::LocalObject;
use zonesync_storage::{
    CollectionChange, ObjectStore, ObservationId, ObservationToken, StorageError,
};
use zonesync_types::{RecordId, RemoteRecord};

/// Receives `(records_to_store, record_ids_to_delete)` for the remote pusher.
pub type PipeToRemote = Arc<dyn Fn(Vec<RemoteRecord>, Vec<RecordId>) + Send + Sync>;

pub(crate) type PipeSlot = Arc<RwLock<Option<PipeToRemote>>>;

/// Hands a batch to the pipe, if one is installed.
pub(crate) fn send(pipe: &PipeSlot, records: Vec<RemoteRecord>, deletions: Vec<RecordId>) {
    let pipe = pipe
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match pipe {
        Some(pipe) => pipe(records, deletions),
        None => debug!(
            "No pipe installed, dropping {} records and {} deletions",
            records.len(),
            deletions.len()
        ),
    }
}

#[derive(Default)]
struct Slot {
    token: Option<ObservationToken>,
    generation: u64,
}

/// The live observer subscription of a sync object.
///
/// Shared with the pending resolvers so their commits skip the observer too.
/// Every `clear` starts a new generation. A registration captured under an
/// older generation is refused by `install`.
#[derive(Clone, Default)]
pub(crate) struct Registration {
    slot: Arc<Mutex<Slot>>,
}

impl Registration {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// IDs to pass to `write_without_notifying`.
    pub(crate) fn ids(&self) -> Vec<ObservationId> {
        self.lock()
            .token
            .as_ref()
            .map(|t| vec![t.id()])
            .unwrap_or_default()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Installs `token` if no `clear` happened since `generation` was read,
    /// dropping (and so unsubscribing) any previous token. A refused token
    /// is dropped too.
    pub(crate) fn install(&self, token: ObservationToken, generation: u64) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        let previous = slot.token.replace(token);
        drop(slot);
        drop(previous);
        true
    }

    pub(crate) fn clear(&self) -> bool {
        let previous = {
            let mut slot = self.lock();
            slot.generation = slot.generation.wrapping_add(1);
            slot.token.take()
        };
        previous.is_some()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.lock().token.is_some()
    }
}

/// Converts local change sets of one model type into push and delete candidates.
pub struct LocalChangeObserver {
    codec: RecordCodec,
    zones: Arc<dyn ZoneResolver>,
    pipe: PipeSlot,
    // Weak: the store's callback owns this observer, and the resolvers
    // own the registration token that removes that callback.
    resolvers: Vec<Weak<PendingRelationshipResolver>>,
}

impl LocalChangeObserver {
    pub(crate) fn new(
        codec: RecordCodec,
        zones: Arc<dyn ZoneResolver>,
        pipe: PipeSlot,
        resolvers: Vec<Weak<PendingRelationshipResolver>>,
    ) -> Self {
        Self {
            codec,
            zones,
            pipe,
            resolvers,
        }
    }

    /// Handles one notification from the store.
    ///
    /// The initial snapshot is ignored. A first upload goes through
    /// `export_all` instead. Every inserted or modified row drops its
    /// pending relationships: the local write is newer than the remote
    /// values they came from.
    pub fn on_change(&self, store: &ObjectStore, change: CollectionChange) {
        let CollectionChange::Update {
            results,
            insertions,
            modifications,
            ..
        } = change
        else {
            return;
        };

        let model = self.codec.model();
        let mut to_store = Vec::new();
        let mut to_delete = Vec::new();

        for &i in insertions.iter().filter(|&&i| i < results.len()) {
            let object = &results[i];
            self.forget_pending(object);
            if !model.is_tombstoned(object) {
                to_store.push(object);
            }
        }
        for &i in modifications.iter().filter(|&&i| i < results.len()) {
            let object = &results[i];
            self.forget_pending(object);
            if !model.is_tombstoned(object) {
                to_store.push(object);
                continue;
            }
            match self.record_id(object) {
                Ok(id) => to_delete.push(id),
                Err(e) => warn!("Cannot delete {} remotely: {}", object.primary_key(), e),
            }
        }

        if to_store.is_empty() && to_delete.is_empty() {
            return;
        }

        let records = match self.convert(store, &to_store) {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to read {} changes: {}", model.record_type(), e);
                return;
            }
        };
        if records.is_empty() && to_delete.is_empty() {
            return;
        }

        debug!(
            "Local {} changes: {} to store, {} to delete",
            model.record_type(),
            records.len(),
            to_delete.len()
        );
        send(&self.pipe, records, to_delete);
    }

    fn forget_pending(&self, object: &LocalObject) {
        for resolver in self.resolvers.iter().filter_map(Weak::upgrade) {
            resolver.forget_owner(object.primary_key());
        }
    }

    fn record_id(&self, object: &LocalObject) -> Result<RecordId, CodecError> {
        let zone = self.zone_for(object)?;
        self.codec.record_id(object, &zone)
    }

    fn zone_for(&self, object: &LocalObject) -> Result<zonesync_types::ZoneId, CodecError> {
        self.zones
            .zone_for(object)
            .ok_or_else(|| CodecError::NoZone {
                record_type: object.record_type().to_string(),
                key: object.primary_key().to_string(),
            })
    }

    /// Converts objects in one read scope. Objects that fail to convert are
    /// logged and left out.
    pub(crate) fn convert(
        &self,
        store: &ObjectStore,
        objects: &[&LocalObject],
    ) -> Result<Vec<RemoteRecord>, StorageError> {
        store.read(|txn| {
            let mut records = Vec::with_capacity(objects.len());
            for object in objects {
                let converted = self
                    .zone_for(object)
                    .and_then(|zone| self.codec.to_record(object, &zone, txn));
                match converted {
                    Ok(record) => records.push(record),
                    Err(CodecError::Storage(e)) => return Err(e),
                    Err(e) => warn!(
                        "Skipping {} {}: {}",
                        object.record_type(),
                        object.primary_key(),
                        e
                    ),
                }
            }
            Ok(records)
        })
    }
}

impl std::fmt::Debug for LocalChangeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalChangeObserver")
            .field("record_type", &self.codec.model().record_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::PendingEntry;
    use crate::zones::StaticZones;
    use zonesync_model::{FieldDescriptor, FieldValue, KeyKind, ModelSchema, SchemaSet};
    use zonesync_types::ZoneId;

    type Pushes = Arc<Mutex<Vec<(Vec<RemoteRecord>, Vec<RecordId>)>>>;

    fn schemas() -> SchemaSet {
        let note = ModelSchema::builder("Note")
            .primary_key("id", KeyKind::String)
            .tombstone("isDeleted")
            .field(FieldDescriptor::string("title"))
            .field(FieldDescriptor::to_one("parent", "Note"))
            .build()
            .unwrap();
        SchemaSet::new(note, vec![]).unwrap()
    }

    fn observer(
        resolvers: Vec<Weak<PendingRelationshipResolver>>,
    ) -> (LocalChangeObserver, Pushes) {
        let pushes: Pushes = Arc::default();
        let sink = pushes.clone();
        let pipe: PipeToRemote =
            Arc::new(move |records: Vec<RemoteRecord>, deletions: Vec<RecordId>| {
                sink.lock().unwrap().push((records, deletions));
            });
        let observer = LocalChangeObserver::new(
            RecordCodec::new(schemas()),
            Arc::new(StaticZones(vec![ZoneId::with_default_owner("Main")])),
            Arc::new(RwLock::new(Some(pipe))),
            resolvers,
        );
        (observer, pushes)
    }

    fn note(id: &str, deleted: bool) -> LocalObject {
        LocalObject::new("Note", id)
            .with("title", FieldValue::String(id.to_string()))
            .with("isDeleted", FieldValue::Bool(deleted))
    }

    fn update(
        results: Vec<LocalObject>,
        insertions: Vec<usize>,
        modifications: Vec<usize>,
    ) -> CollectionChange {
        CollectionChange::Update {
            results,
            deletions: Vec::new(),
            insertions,
            modifications,
        }
    }

    // ── Stale indices ────────────────────────────────────────────────

    #[test]
    fn out_of_range_indices_are_skipped() {
        let store = ObjectStore::open_in_memory().unwrap();
        let (observer, pushes) = observer(Vec::new());

        observer.on_change(&store, update(vec![note("n1", false)], vec![0, 5], vec![3]));

        let pushes = pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        let (records, deletions) = &pushes[0];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_id().record_name(), "n1");
        assert!(deletions.is_empty());
    }

    #[test]
    fn only_stale_indices_send_nothing() {
        let store = ObjectStore::open_in_memory().unwrap();
        let (observer, pushes) = observer(Vec::new());

        observer.on_change(&store, update(vec![note("n1", false)], vec![1], vec![1, 7]));

        assert!(pushes.lock().unwrap().is_empty());
    }

    #[test]
    fn stale_indices_after_a_tombstone_are_skipped() {
        let store = ObjectStore::open_in_memory().unwrap();
        let (observer, pushes) = observer(Vec::new());
        let results = vec![note("n1", false), note("n2", true)];

        observer.on_change(&store, update(results, Vec::new(), vec![1, 2, 9]));

        let pushes = pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        let (records, deletions) = &pushes[0];
        assert!(records.is_empty());
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].record_name(), "n2");
    }

    #[test]
    fn initial_snapshot_is_ignored() {
        let store = ObjectStore::open_in_memory().unwrap();
        let (observer, pushes) = observer(Vec::new());

        observer.on_change(&store, CollectionChange::Initial(vec![note("n1", false)]));

        assert!(pushes.lock().unwrap().is_empty());
    }

    // ── Pending relationships ────────────────────────────────────────

    #[test]
    fn local_edit_drops_pending_entries_of_changed_rows() {
        let store = ObjectStore::open_in_memory().unwrap();
        let resolver = Arc::new(PendingRelationshipResolver::new(
            schemas(),
            "Note",
            Registration::default(),
        ));
        for owner in ["n1", "n2"] {
            resolver.record(PendingEntry::new(
                &owner.into(),
                "parent",
                "Note",
                "missing".into(),
            ));
        }
        let (observer, _pushes) = observer(vec![Arc::downgrade(&resolver)]);

        observer.on_change(&store, update(vec![note("n1", false)], Vec::new(), vec![0, 4]));

        let owners: Vec<String> = resolver
            .entries()
            .iter()
            .map(|e| e.owner.to_string())
            .collect();
        assert_eq!(owners, vec!["n2".to_string()]);
    }
}
