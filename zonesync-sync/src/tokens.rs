//! Per-zone sync cursors and zone-provisioned flags.
//!
//! Keys are namespaced as `<RecordType>.<ZoneOwner>.<ZoneName>.<suffix>` so
//! several model types can share one settings store.

use crate::error::SyncResult;
use std::sync::Arc;
use tracing::debug;
use zonesync_storage::SettingsStore;
use zonesync_types::{SyncCursor, ZoneId};

const CHANGE_TOKEN: &str = "changeToken";
const ZONE_CREATED: &str = "zoneCreated";

/// Persists one cursor and one provisioned flag per zone for a model type.
///
/// Every call is synchronous and local.
#[derive(Clone)]
pub struct TokenStore {
    record_type: String,
    settings: Arc<dyn SettingsStore>,
}

impl TokenStore {
    pub fn new(record_type: impl Into<String>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            record_type: record_type.into(),
            settings,
        }
    }

    /// The settings key for one zone and suffix.
    pub fn key(&self, zone: &ZoneId, suffix: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.record_type,
            zone.owner_name(),
            zone.zone_name(),
            suffix
        )
    }

    /// The stored cursor, or `None` when a full resync is required.
    pub fn cursor(&self, zone: &ZoneId) -> SyncResult<Option<SyncCursor>> {
        Ok(self
            .settings
            .bytes(&self.key(zone, CHANGE_TOKEN))?
            .map(SyncCursor::new))
    }

    /// Replaces the cursor. `None` removes it.
    pub fn set_cursor(&self, zone: &ZoneId, cursor: Option<&SyncCursor>) -> SyncResult<()> {
        let key = self.key(zone, CHANGE_TOKEN);
        match cursor {
            Some(c) => self.settings.set_bytes(&key, c.as_bytes())?,
            None => {
                self.settings.remove(&key)?;
                debug!("Cleared cursor for {} in zone {}", self.record_type, zone);
            }
        }
        Ok(())
    }

    pub fn is_provisioned(&self, zone: &ZoneId) -> SyncResult<bool> {
        Ok(self
            .settings
            .bool(&self.key(zone, ZONE_CREATED))?
            .unwrap_or(false))
    }

    pub fn set_provisioned(&self, zone: &ZoneId, provisioned: bool) -> SyncResult<()> {
        self.settings
            .set_bool(&self.key(zone, ZONE_CREATED), provisioned)?;
        Ok(())
    }

    /// Forgets the cursor and provisioned flag of one zone.
    pub fn reset_partition(&self, zone: &ZoneId) -> SyncResult<()> {
        self.settings.remove(&self.key(zone, CHANGE_TOKEN))?;
        self.settings.remove(&self.key(zone, ZONE_CREATED))?;
        debug!("Reset sync state for {} in zone {}", self.record_type, zone);
        Ok(())
    }

    /// Removes every key stored for this model type.
    pub fn purge(&self) -> SyncResult<usize> {
        let keys = self
            .settings
            .keys_with_prefix(&format!("{}.", self.record_type))?;
        for key in &keys {
            self.settings.remove(key)?;
        }
        Ok(keys.len())
    }
}
