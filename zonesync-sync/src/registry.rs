//! Host-side fan-out over every registered model type.

use crate::error::{SyncError, SyncResult};
use crate::observer::PipeToRemote;
use crate::queue::Completion;
use crate::syncable::Syncable;
use crate::zones::dedup_zones;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use zonesync_types::{RecordId, RemoteRecord, ZoneId};

/// Routes pulled changes to the sync object of their record type.
///
/// A record ID carries no record type, so deletions are addressed by type
/// explicitly.
#[derive(Default)]
pub struct SyncRegistry {
    objects: BTreeMap<String, Arc<dyn Syncable>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sync object. Each record type may be registered once.
    pub fn register(&mut self, object: Arc<dyn Syncable>) -> SyncResult<()> {
        let record_type = object.record_type().to_string();
        if self.objects.contains_key(&record_type) {
            return Err(SyncError::DuplicateRecordType(record_type));
        }
        debug!("Registered sync object for {}", record_type);
        self.objects.insert(record_type, object);
        Ok(())
    }

    pub fn get(&self, record_type: &str) -> Option<&Arc<dyn Syncable>> {
        self.objects.get(record_type)
    }

    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Ingests a record through the sync object of its type. Records of an
    /// unknown type are logged and dropped.
    pub fn ingest(&self, record: RemoteRecord) -> Completion {
        match self.objects.get(record.record_type()) {
            Some(object) => object.ingest(record),
            None => {
                warn!("No sync object for record type {}", record.record_type());
                Completion::ready()
            }
        }
    }

    pub fn delete(&self, record_type: &str, record_id: RecordId) -> Completion {
        match self.objects.get(record_type) {
            Some(object) => object.delete(record_id),
            None => {
                warn!("No sync object for record type {}", record_type);
                Completion::ready()
            }
        }
    }

    /// Every zone any model syncs through, deduplicated.
    pub fn zone_ids(&self) -> Vec<ZoneId> {
        dedup_zones(self.objects.values().flat_map(|o| o.zone_ids()).collect())
    }

    pub fn set_pipe_to_remote(&self, pipe: PipeToRemote) {
        for object in self.objects.values() {
            object.set_pipe_to_remote(pipe.clone());
        }
    }

    pub async fn resolve_all_pending_relationships(&self) {
        for object in self.objects.values() {
            object.resolve_all_pending_relationships().await;
        }
    }

    pub async fn purge_tombstoned(&self) {
        for object in self.objects.values() {
            object.purge_tombstoned().await;
        }
    }

    pub async fn register_local_changes(&self) {
        for object in self.objects.values() {
            object.register_local_changes().await;
        }
    }

    pub fn unregister_local_changes(&self) {
        for object in self.objects.values() {
            object.unregister_local_changes();
        }
    }

    /// Exports every model. Returns the total number of records sent.
    pub fn export_all(&self) -> SyncResult<usize> {
        self.objects.values().map(|o| o.export_all()).sum()
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("record_types", &self.objects.keys().collect::<Vec<_>>())
            .finish()
    }
}
