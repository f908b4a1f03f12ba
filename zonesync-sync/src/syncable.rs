use crate::error::SyncResult;
use crate::observer::PipeToRemote;
use crate::queue::Completion;
use zonesync_types::{RecordId, RemoteRecord, SyncCursor, ZoneId};

/// The uniform contract every per-model sync engine exposes to the host.
///
/// The host's pull loop calls [`ingest`](Self::ingest) and
/// [`delete`](Self::delete) for each fetched change, then
/// [`resolve_all_pending_relationships`](Self::resolve_all_pending_relationships)
/// once per batch, then persists the new cursor. The push side installs a
/// pipe with [`set_pipe_to_remote`](Self::set_pipe_to_remote).
///
/// Mutating operations run on a serialized background queue and return a
/// [`Completion`]. Cursor, flag and export calls run on the caller.
pub trait Syncable: Send + Sync {
    fn record_type(&self) -> &str;

    /// Zones this model syncs through: deduplicated, placeholders removed.
    fn zone_ids(&self) -> Vec<ZoneId>;

    fn cursor(&self, zone: &ZoneId) -> SyncResult<Option<SyncCursor>>;

    /// Stores a cursor. `None` forces a full resync of the zone.
    fn set_cursor(&self, zone: &ZoneId, cursor: Option<&SyncCursor>) -> SyncResult<()>;

    fn is_provisioned(&self, zone: &ZoneId) -> SyncResult<bool>;

    fn set_provisioned(&self, zone: &ZoneId, provisioned: bool) -> SyncResult<()>;

    /// Applies a fetched record locally without echoing it back.
    fn ingest(&self, record: RemoteRecord) -> Completion;

    /// Removes the local row of a record deleted remotely.
    fn delete(&self, record_id: RecordId) -> Completion;

    /// Starts observing local changes. Replaces any previous subscription.
    fn register_local_changes(&self) -> Completion;

    /// Stops observing local changes, including a registration still
    /// waiting in the queue.
    fn unregister_local_changes(&self);

    fn resolve_all_pending_relationships(&self) -> Completion;

    /// Deletes every tombstoned row. Best effort.
    fn purge_tombstoned(&self) -> Completion;

    /// Sends every live row through the pipe. Returns how many were sent,
    /// which is 0 when no pipe is installed.
    fn export_all(&self) -> SyncResult<usize>;

    fn set_pipe_to_remote(&self, pipe: PipeToRemote);
}
