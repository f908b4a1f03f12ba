//! Zone resolution for a model type.

use std::collections::HashSet;
use zonesync_model::LocalObject;
use zonesync_types::ZoneId;

/// Supplies the zones a model type syncs through.
///
/// Resolution is lazy: a resolver may return placeholder (empty-named) zones
/// until the real ones are discovered.
pub trait ZoneResolver: Send + Sync {
    /// Every zone this model type may live in, possibly with duplicates.
    fn zone_ids(&self) -> Vec<ZoneId>;

    /// The zone a given object is pushed to. Defaults to the first resolved zone.
    fn zone_for(&self, object: &LocalObject) -> Option<ZoneId> {
        let _ = object;
        self.zone_ids().into_iter().find(ZoneId::is_resolved)
    }
}

impl<F> ZoneResolver for F
where
    F: Fn() -> Vec<ZoneId> + Send + Sync,
{
    fn zone_ids(&self) -> Vec<ZoneId> {
        self()
    }
}

/// A fixed list of zones.
#[derive(Debug, Clone)]
pub struct StaticZones(pub Vec<ZoneId>);

impl ZoneResolver for StaticZones {
    fn zone_ids(&self) -> Vec<ZoneId> {
        self.0.clone()
    }
}

/// Drops unresolved zones and duplicates, keeping first-seen order.
pub fn dedup_zones(zones: Vec<ZoneId>) -> Vec<ZoneId> {
    let mut seen = HashSet::new();
    zones
        .into_iter()
        .filter(|z| z.is_resolved() && seen.insert(z.clone()))
        .collect()
}
