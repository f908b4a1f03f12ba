//! Per-model sync orchestrator.

use crate::codec::RecordCodec;
use crate::config::SyncObjectConfig;
use crate::error::{CodecError, SyncResult};
use crate::observer::{self, LocalChangeObserver, PipeSlot, PipeToRemote, Registration};
use crate::pending::PendingRelationshipResolver;
use crate::queue::{Completion, SerialQueue};
use crate::syncable::Syncable;
use crate::tokens::TokenStore;
use crate::zones::{dedup_zones, StaticZones, ZoneResolver};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use zonesync_assets::AssetStore;
use zonesync_model::{LocalObject, SchemaSet};
use zonesync_storage::{ObjectStore, SettingsStore};
use zonesync_types::{RecordId, RemoteRecord, SyncCursor, ZoneId};

/// Builder for [`SyncObject`].
pub struct SyncObjectBuilder {
    schemas: SchemaSet,
    store: ObjectStore,
    settings: Arc<dyn SettingsStore>,
    zones: Option<Arc<dyn ZoneResolver>>,
    assets: Option<Arc<dyn AssetStore>>,
    config: SyncObjectConfig,
}

impl SyncObjectBuilder {
    /// Supplies the zones this model syncs through. Without a resolver the
    /// configured default zone is used.
    pub fn zones(mut self, zones: impl ZoneResolver + 'static) -> Self {
        self.zones = Some(Arc::new(zones));
        self
    }

    /// Store holding the payloads of asset fields, released on delete.
    pub fn assets(mut self, assets: Arc<dyn AssetStore>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn config(mut self, config: SyncObjectConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the sync object and starts its background queue.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> SyncResult<SyncObject> {
        let record_type = self.schemas.model().record_type().to_string();
        let queue = SerialQueue::start(record_type.clone())?;

        let zones: Arc<dyn ZoneResolver> = match self.zones {
            Some(zones) => zones,
            None => Arc::new(StaticZones(vec![self.config.default_zone()])),
        };
        let codec = RecordCodec::new(self.schemas.clone());
        let registration = Registration::default();
        let pipe: PipeSlot = Arc::new(RwLock::new(None));

        let resolvers: BTreeMap<String, Arc<PendingRelationshipResolver>> = self
            .schemas
            .model()
            .related_types()
            .into_iter()
            .map(|t| {
                let resolver =
                    PendingRelationshipResolver::new(self.schemas.clone(), t, registration.clone());
                (t.to_string(), Arc::new(resolver))
            })
            .collect();

        info!("Sync object ready for {}", record_type);
        Ok(SyncObject {
            inner: Arc::new(Inner {
                observer: Arc::new(LocalChangeObserver::new(
                    codec.clone(),
                    zones.clone(),
                    pipe.clone(),
                    resolvers.values().map(Arc::downgrade).collect(),
                )),
                tokens: TokenStore::new(&record_type, self.settings),
                codec,
                store: self.store,
                zones,
                assets: self.assets,
                resolvers,
                registration,
                pipe,
                config: self.config,
            }),
            queue,
        })
    }
}

struct Inner {
    codec: RecordCodec,
    store: ObjectStore,
    tokens: TokenStore,
    zones: Arc<dyn ZoneResolver>,
    assets: Option<Arc<dyn AssetStore>>,
    resolvers: BTreeMap<String, Arc<PendingRelationshipResolver>>,
    observer: Arc<LocalChangeObserver>,
    registration: Registration,
    pipe: PipeSlot,
    config: SyncObjectConfig,
}

impl Inner {
    fn record_type(&self) -> &str {
        self.codec.model().record_type()
    }

    fn ingest(&self, record: &RemoteRecord) -> SyncResult<()> {
        let decoded = self
            .store
            .write_without_notifying(&self.registration.ids(), |txn| {
                match self.codec.from_record(record, txn) {
                    Ok(decoded) => {
                        txn.upsert(&decoded.object)?;
                        Ok(Some(decoded))
                    }
                    Err(CodecError::Storage(e)) => Err(e),
                    Err(e) => {
                        warn!("Failed to ingest {}: {}", record.record_id(), e);
                        Ok(None)
                    }
                }
            })?;

        if let Some(decoded) = decoded {
            let owner = decoded.object.primary_key();
            // The fresh field values supersede anything still pending.
            for resolver in self.resolvers.values() {
                resolver.forget_owner(owner);
            }
            for entry in decoded.pending {
                match self.resolvers.get(&entry.target_type) {
                    Some(resolver) => resolver.record(entry),
                    None => warn!("No resolver for related type {}", entry.target_type),
                }
            }
            debug!("Ingested {} {}", self.record_type(), owner);
        }
        self.refresh_resolvers();
        Ok(())
    }

    fn delete(&self, record_id: &RecordId) -> SyncResult<()> {
        let record_type = self.record_type();
        let key = match record_id.primary_key(self.codec.model().key_kind()) {
            Ok(key) => key,
            Err(e) => {
                warn!("Ignoring delete of {}: {}", record_id, e);
                return Ok(());
            }
        };

        let removed = self
            .store
            .write_without_notifying(&self.registration.ids(), |txn| {
                let Some(existing) = txn.get(record_type, &key)? else {
                    return Ok(None);
                };
                txn.delete(record_type, &key)?;
                Ok(Some(existing))
            })?;
        self.refresh_resolvers();

        match removed {
            Some(object) => {
                self.release_assets(std::slice::from_ref(&object));
                for resolver in self.resolvers.values() {
                    resolver.forget_owner(&key);
                }
                debug!("Deleted {} {}", record_type, key);
            }
            None => debug!("Delete of {}: already gone", record_id),
        }
        Ok(())
    }

    fn purge_tombstoned(&self) -> SyncResult<usize> {
        let model = self.codec.model();
        let removed = self
            .store
            .write_without_notifying(&self.registration.ids(), |txn| {
                let dead: Vec<LocalObject> = txn
                    .objects(model.record_type())?
                    .into_iter()
                    .filter(|o| model.is_tombstoned(o))
                    .collect();
                for object in &dead {
                    txn.delete(model.record_type(), object.primary_key())?;
                }
                Ok(dead)
            })?;
        self.refresh_resolvers();

        self.release_assets(&removed);
        for object in &removed {
            for resolver in self.resolvers.values() {
                resolver.forget_owner(object.primary_key());
            }
        }
        Ok(removed.len())
    }

    /// Subscribes unless an unregister happened after `generation` was read.
    fn register(&self, generation: u64) -> SyncResult<()> {
        let observer = self.observer.clone();
        let token = self
            .store
            .observe(self.record_type(), move |store, change| {
                observer.on_change(store, change)
            })?;
        if self.registration.install(token, generation) {
            info!("Observing local {} changes", self.record_type());
        } else {
            debug!("Unregistered before {} observation started", self.record_type());
        }
        Ok(())
    }

    fn resolve_all(&self) {
        for resolver in self.resolvers.values() {
            if let Err(e) = resolver.resolve_all() {
                warn!(
                    "Failed to resolve {} relationships of {}: {}",
                    resolver.related_type(),
                    self.record_type(),
                    e
                );
            }
        }
    }

    fn refresh_resolvers(&self) {
        for resolver in self.resolvers.values() {
            resolver.refresh_store(&self.store);
        }
    }

    fn release_assets(&self, objects: &[LocalObject]) {
        let Some(assets) = &self.assets else {
            return;
        };
        for asset in objects.iter().flat_map(LocalObject::assets) {
            if let Err(e) = assets.delete(&asset.key) {
                warn!("Failed to release asset {}: {}", asset.key, e);
            }
        }
    }
}

/// Syncs one model type between the local store and a remote record store.
///
/// Owns the model's cursors, its pending relationship resolvers (one per
/// related type) and its local change subscription. Writes run on a
/// private serialized queue, so an `ingest` followed by
/// `resolve_all_pending_relationships` always sees the ingested row.
pub struct SyncObject {
    inner: Arc<Inner>,
    queue: SerialQueue,
}

impl SyncObject {
    pub fn builder(
        schemas: SchemaSet,
        store: ObjectStore,
        settings: Arc<dyn SettingsStore>,
    ) -> SyncObjectBuilder {
        SyncObjectBuilder {
            schemas,
            store,
            settings,
            zones: None,
            assets: None,
            config: SyncObjectConfig::default(),
        }
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.inner.codec
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn config(&self) -> &SyncObjectConfig {
        &self.inner.config
    }

    /// The resolver for relationships pointing at `related_type`.
    pub fn resolver(&self, related_type: &str) -> Option<&PendingRelationshipResolver> {
        self.inner.resolvers.get(related_type).map(Arc::as_ref)
    }

    /// Relationships still waiting for their targets, across all related types.
    pub fn pending_relationship_count(&self) -> usize {
        self.inner
            .resolvers
            .values()
            .map(|r| r.pending_count())
            .sum()
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registration.is_registered()
    }

    fn submit(&self, job: impl FnOnce(&Inner) + Send + 'static) -> Completion {
        let inner = self.inner.clone();
        self.queue.submit(move || job(inner.as_ref()))
    }
}

impl Syncable for SyncObject {
    fn record_type(&self) -> &str {
        self.inner.record_type()
    }

    fn zone_ids(&self) -> Vec<ZoneId> {
        dedup_zones(self.inner.zones.zone_ids())
    }

    fn cursor(&self, zone: &ZoneId) -> SyncResult<Option<SyncCursor>> {
        self.inner.tokens.cursor(zone)
    }

    fn set_cursor(&self, zone: &ZoneId, cursor: Option<&SyncCursor>) -> SyncResult<()> {
        self.inner.tokens.set_cursor(zone, cursor)
    }

    fn is_provisioned(&self, zone: &ZoneId) -> SyncResult<bool> {
        self.inner.tokens.is_provisioned(zone)
    }

    fn set_provisioned(&self, zone: &ZoneId, provisioned: bool) -> SyncResult<()> {
        self.inner.tokens.set_provisioned(zone, provisioned)
    }

    fn ingest(&self, record: RemoteRecord) -> Completion {
        self.submit(move |inner| {
            if let Err(e) = inner.ingest(&record) {
                warn!("Failed to ingest {}: {}", record.record_id(), e);
            }
        })
    }

    fn delete(&self, record_id: RecordId) -> Completion {
        self.submit(move |inner| {
            if let Err(e) = inner.delete(&record_id) {
                warn!("Failed to delete {}: {}", record_id, e);
            }
        })
    }

    fn register_local_changes(&self) -> Completion {
        let generation = self.inner.registration.generation();
        self.submit(move |inner| {
            if let Err(e) = inner.register(generation) {
                warn!("Failed to observe {}: {}", inner.record_type(), e);
            }
        })
    }

    fn unregister_local_changes(&self) {
        if self.inner.registration.clear() {
            info!("Stopped observing local {} changes", self.record_type());
        }
    }

    fn resolve_all_pending_relationships(&self) -> Completion {
        self.submit(Inner::resolve_all)
    }

    fn purge_tombstoned(&self) -> Completion {
        self.submit(|inner| match inner.purge_tombstoned() {
            Ok(0) => {}
            Ok(n) => info!("Purged {} tombstoned {} rows", n, inner.record_type()),
            Err(e) => warn!("Purge of {} failed, will retry: {}", inner.record_type(), e),
        })
    }

    fn export_all(&self) -> SyncResult<usize> {
        let inner = &self.inner;
        let model = inner.codec.model();
        if inner
            .pipe
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            warn!("No pipe installed, skipping export of {}", model.record_type());
            return Ok(0);
        }
        let live: Vec<LocalObject> = inner
            .store
            .read(|txn| txn.objects(model.record_type()))?
            .into_iter()
            .filter(|o| !model.is_tombstoned(o))
            .collect();
        if live.is_empty() {
            return Ok(0);
        }

        let objects: Vec<&LocalObject> = live.iter().collect();
        let records = inner.observer.convert(&inner.store, &objects)?;
        let total = records.len();
        let batch = inner.config.export_batch_size.max(1);
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let chunk: Vec<RemoteRecord> = records.by_ref().take(batch).collect();
            observer::send(&inner.pipe, chunk, Vec::new());
        }
        info!("Exported {} {} records", total, model.record_type());
        Ok(total)
    }

    fn set_pipe_to_remote(&self, pipe: PipeToRemote) {
        *self
            .inner
            .pipe
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(pipe);
    }
}

impl std::fmt::Debug for SyncObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncObject")
            .field("record_type", &self.record_type())
            .field("registered", &self.is_registered())
            .finish()
    }
}
