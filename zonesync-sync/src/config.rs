use serde::{Deserialize, Serialize};
use zonesync_types::{ZoneId, DEFAULT_ZONE_OWNER};

/// Configuration for a sync object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncObjectConfig {
    /// Maximum records handed to the pipe per call during a full export.
    pub export_batch_size: usize,
    /// Zone used when no zone resolver is supplied.
    pub default_zone_name: String,
    /// Owner of the default zone.
    pub default_zone_owner: String,
}

impl SyncObjectConfig {
    /// The zone built from `default_zone_name` and `default_zone_owner`.
    pub fn default_zone(&self) -> ZoneId {
        ZoneId::new(&self.default_zone_name, &self.default_zone_owner)
    }
}

impl Default for SyncObjectConfig {
    fn default() -> Self {
        Self {
            export_batch_size: 400,
            default_zone_name: "zonesync".to_string(),
            default_zone_owner: DEFAULT_ZONE_OWNER.to_string(),
        }
    }
}
