//! Scripted blob store for exercising persistence paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use damian_config::{BlobStore, MemoryBlobStore, StorageError, StorageResult};

/// One recorded blob-store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `get_item(key)`.
    Get(String),
    /// `set_item(key, value)`.
    Set(String, String),
    /// `remove_item(key)`.
    Remove(String),
}

/// In-memory blob store whose calls are logged and can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBlobStore {
    items: MemoryBlobStore,
    state: Arc<ScriptState>,
}

#[derive(Debug, Default)]
struct ScriptState {
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    log: Mutex<Vec<StoreOp>>,
}

impl ScriptedBlobStore {
    /// Empty store with every operation succeeding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without logging it.
    pub fn seed(&self, key: &str, value: &str) {
        self.items.insert(key, value);
    }

    /// Current blob under `key`.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<String> {
        self.items.item(key)
    }

    /// Make `get_item` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `set_item` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `remove_item` fail.
    pub fn fail_removes(&self, fail: bool) {
        self.state.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Sleep for `delay` inside every `set_item` before storing.
    pub fn delay_writes(&self, delay: Option<Duration>) {
        *lock(&self.state.write_delay) = delay;
    }

    /// Every call recorded so far.
    #[must_use]
    pub fn log(&self) -> Vec<StoreOp> {
        lock(&self.state.log).clone()
    }

    /// Forget recorded calls.
    pub fn clear_log(&self) {
        lock(&self.state.log).clear();
    }

    /// Values passed to `set_item` for `key`, oldest first.
    #[must_use]
    pub fn writes_to(&self, key: &str) -> Vec<String> {
        lock(&self.state.log)
            .iter()
            .filter_map(|op| match op {
                StoreOp::Set(written, value) if written == key => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `remove_item` calls for `key`.
    #[must_use]
    pub fn removes_of(&self, key: &str) -> usize {
        lock(&self.state.log)
            .iter()
            .filter(|op| matches!(op, StoreOp::Remove(removed) if removed == key))
            .count()
    }

    fn record(&self, op: StoreOp) {
        lock(&self.state.log).push(op);
    }
}

fn scripted_failure(operation: &'static str, key: &str) -> StorageError {
    StorageError::Unavailable {
        operation,
        key: key.to_string(),
        reason: "scripted failure".to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.record(StoreOp::Get(key.to_string()));
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(scripted_failure("blob.read", key));
        }
        self.items.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.record(StoreOp::Set(key.to_string(), value.to_string()));
        let delay = *lock(&self.state.write_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(scripted_failure("blob.write", key));
        }
        self.items.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.record(StoreOp::Remove(key.to_string()));
        if self.state.fail_removes.load(Ordering::SeqCst) {
            return Err(scripted_failure("blob.remove", key));
        }
        self.items.remove_item(key).await
    }
}
