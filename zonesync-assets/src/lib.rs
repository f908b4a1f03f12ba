//! Out-of-band storage for asset field payloads.
//!
//! Records only carry an asset key; the bytes live here. The sync core calls
//! [`AssetStore::delete`] whenever it removes a row holding an asset.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors that can occur in asset operations.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("invalid asset key: {0:?}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores binary payloads under stable keys.
pub trait AssetStore: Send + Sync {
    fn store(&self, key: &str, data: &[u8]) -> AssetResult<()>;

    fn read(&self, key: &str) -> AssetResult<Vec<u8>>;

    /// Deletes a payload. Deleting an absent key is a no-op.
    fn delete(&self, key: &str) -> AssetResult<()>;

    fn contains(&self, key: &str) -> AssetResult<bool>;
}

/// One file per key under a root directory.
pub struct DirectoryAssetStore {
    root: PathBuf,
}

impl DirectoryAssetStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> AssetResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> AssetResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(AssetError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl AssetStore for DirectoryAssetStore {
    fn store(&self, key: &str, data: &[u8]) -> AssetResult<()> {
        let path = self.path_for(key)?;
        fs::write(&path, data)?;
        debug!("Stored asset {} ({} bytes)", key, data.len());
        Ok(())
    }

    fn read(&self, key: &str) -> AssetResult<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::NotFound(key.to_string()),
            _ => AssetError::Io(e),
        })
    }

    fn delete(&self, key: &str) -> AssetResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted asset {}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &str) -> AssetResult<bool> {
        Ok(self.path_for(key)?.is_file())
    }
}

/// Payloads held in process memory.
#[derive(Default)]
pub struct MemoryAssetStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetStore for MemoryAssetStore {
    fn store(&self, key: &str, data: &[u8]) -> AssetResult<()> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> AssetResult<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> AssetResult<()> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> AssetResult<bool> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}
