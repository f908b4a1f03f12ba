//! Opaque incremental-sync cursor.

use serde::{Deserialize, Serialize};

/// Server-issued marker of "everything up to here has been pulled" for one
/// zone. The core never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncCursor(Vec<u8>);

impl SyncCursor {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for SyncCursor {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
