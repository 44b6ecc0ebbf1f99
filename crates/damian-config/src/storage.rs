//! Async key-value blob stores the settings document is persisted to.
//!
//! # Design
//! - The store only ever writes whole strings under a handful of reserved keys.
//! - `FileBlobStore` keeps one file per key and replaces it atomically.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{StorageError, StorageResult};

/// Asynchronous string-keyed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `key`; `None` when absent.
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous blob.
    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove the blob under `key`. Removing an absent key succeeds.
    async fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// In-process blob store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous peek at a stored blob.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Synchronously seed a blob.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.item(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Blob store keeping one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Use `root` as the storage directory; it is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
        if valid {
            Ok(self.root.join(format!("{key}.json")))
        } else {
            Err(StorageError::InvalidKey {
                key: key.to_string(),
            })
        }
    }
}

fn io_error(operation: &'static str, key: &str, source: io::Error) -> StorageError {
    StorageError::Io {
        operation,
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("blob.read", key, err)),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| io_error("blob.create_dir", key, err))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)
            .await
            .map_err(|err| io_error("blob.write", key, err))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|err| io_error("blob.rename", key, err))
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("blob.remove", key, err)),
        }
    }
}
