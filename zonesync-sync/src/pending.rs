//! Deferred forward references.
//!
//! Records arrive in arbitrary order, so a relationship may name a target
//! that has not been ingested yet. The codec hands such relationships back as
//! [`PendingEntry`]s; the resolver for the target type keeps them and attaches
//! each one once its target shows up in the local store.

use crate::error::SyncResult;
use crate::observer::Registration;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use zonesync_model::{FieldKind, FieldValue, PrimaryKey, SchemaSet};
use zonesync_storage::ObjectStore;

/// One relationship waiting for its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingEntry {
    /// Primary key of the row holding the relationship.
    pub owner: PrimaryKey,
    /// Relationship field on the owner.
    pub field: String,
    /// Record type of the missing row.
    pub target_type: String,
    /// Primary key of the missing row.
    pub target: PrimaryKey,
}

impl PendingEntry {
    pub fn new(owner: &PrimaryKey, field: &str, target_type: &str, target: PrimaryKey) -> Self {
        Self {
            owner: owner.clone(),
            field: field.to_string(),
            target_type: target_type.to_string(),
            target,
        }
    }
}

enum Outcome {
    Attached,
    TargetMissing,
    OwnerGone,
    Superseded,
}

/// Holds the pending relationships that point at one related type.
pub struct PendingRelationshipResolver {
    schemas: SchemaSet,
    related_type: String,
    entries: Mutex<Vec<PendingEntry>>,
    store: Mutex<Option<ObjectStore>>,
    registration: Registration,
}

impl PendingRelationshipResolver {
    pub(crate) fn new(schemas: SchemaSet, related_type: &str, registration: Registration) -> Self {
        Self {
            schemas,
            related_type: related_type.to_string(),
            entries: Mutex::new(Vec::new()),
            store: Mutex::new(None),
            registration,
        }
    }

    pub fn related_type(&self) -> &str {
        &self.related_type
    }

    /// Records an entry. Recording the same entry twice keeps one copy.
    pub fn record(&self, entry: PendingEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains(&entry) {
            debug!(
                "Pending {}.{} -> {} {}",
                entry.owner, entry.field, entry.target_type, entry.target
            );
            entries.push(entry);
        }
    }

    /// Drops every entry owned by `owner`. Called whenever the owner's
    /// relationship fields are rewritten, remotely or locally.
    pub fn forget_owner(&self, owner: &PrimaryKey) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|e| &e.owner != owner);
    }

    /// Points the resolver at the most recent store handle.
    pub fn refresh_store(&self, store: &ObjectStore) {
        *self.store.lock().unwrap_or_else(PoisonError::into_inner) = Some(store.clone());
    }

    pub fn pending_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn entries(&self) -> Vec<PendingEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Attaches every pending relationship whose target now exists.
    ///
    /// Works on a snapshot taken at call time. Entries recorded meanwhile
    /// wait for the next call. Each attachment commits on its own and its
    /// entry is removed only after that commit. A to-one field that already
    /// points at another row is left alone and its entry dropped. Returns
    /// how many entries were attached.
    pub fn resolve_all(&self) -> SyncResult<usize> {
        let snapshot = self.entries();
        if snapshot.is_empty() {
            return Ok(0);
        }
        let store = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(store) = store else {
            debug!(
                "No store yet for {} resolver, {} entries wait",
                self.related_type,
                snapshot.len()
            );
            return Ok(0);
        };

        let owner_type = self.schemas.model().record_type();
        let mut attached = 0;
        for entry in snapshot {
            let outcome = store.write_without_notifying(&self.registration.ids(), |txn| {
                if !txn.contains(&entry.target_type, &entry.target)? {
                    return Ok(Outcome::TargetMissing);
                }
                let Some(mut owner) = txn.get(owner_type, &entry.owner)? else {
                    return Ok(Outcome::OwnerGone);
                };
                let value = match self.schemas.model().field(&entry.field).map(|f| &f.kind) {
                    Some(FieldKind::ToMany { .. }) => {
                        let mut keys = owner.references(&entry.field).to_vec();
                        if !keys.contains(&entry.target) {
                            keys.push(entry.target.clone());
                        }
                        FieldValue::References(keys)
                    }
                    _ => match owner.reference(&entry.field) {
                        // Set to another row since the entry was recorded.
                        Some(current) if current != &entry.target => {
                            return Ok(Outcome::Superseded);
                        }
                        _ => FieldValue::Reference(Some(entry.target.clone())),
                    },
                };
                owner.set(entry.field.clone(), value);
                txn.upsert(&owner)?;
                Ok(Outcome::Attached)
            })?;

            match outcome {
                Outcome::TargetMissing => continue,
                Outcome::Attached => {
                    attached += 1;
                    debug!("Attached {}.{} -> {}", entry.owner, entry.field, entry.target);
                }
                Outcome::OwnerGone => {
                    debug!("Dropping pending entry of deleted {} {}", owner_type, entry.owner);
                }
                Outcome::Superseded => {
                    debug!(
                        "Dropping pending {}.{} -> {}: field changed locally",
                        entry.owner, entry.field, entry.target
                    );
                }
            }
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|e| e != &entry);
        }

        if attached > 0 {
            info!(
                "Resolved {} pending {} relationships of {}",
                attached, self.related_type, owner_type
            );
        }
        Ok(attached)
    }
}

impl std::fmt::Debug for PendingRelationshipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRelationshipResolver")
            .field("related_type", &self.related_type)
            .field("pending", &self.pending_count())
            .finish()
    }
}
