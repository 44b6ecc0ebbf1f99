//! Event recording and persisted-snapshot fixtures.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use damian_config::{CONFIG_KEY, ConfigStore, VERSION_KEY};
use damian_events::{ConfigEvent, Subscription};
use serde_json::Value;

use crate::mocks::ScriptedBlobStore;

/// Subscriber that keeps a copy of every event it receives.
#[derive(Debug)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<ConfigEvent>>>,
    subscription: Subscription,
}

impl EventRecorder {
    /// Subscribe a new recorder to `store`.
    #[must_use]
    pub fn attach(store: &ConfigStore) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = store.subscribe(move |event| lock(&sink).push(event.clone()));
        Self {
            events,
            subscription,
        }
    }

    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<ConfigEvent> {
        lock(&self.events).clone()
    }

    /// Kinds of the events received so far.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(ConfigEvent::kind).collect()
    }

    /// Forget received events.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    /// Unsubscribe from the store.
    pub fn detach(self) -> bool {
        self.subscription.unsubscribe()
    }
}

/// Scripted store pre-loaded with `document` and an optional version tag.
///
/// # Errors
///
/// Returns an error if `document` cannot be serialized.
pub fn seeded_storage(document: &Value, version: Option<&str>) -> Result<ScriptedBlobStore> {
    let storage = ScriptedBlobStore::new();
    let raw = serde_json::to_string(document).context("serialize seeded settings")?;
    storage.seed(CONFIG_KEY, &raw);
    if let Some(version) = version {
        storage.seed(VERSION_KEY, version);
    }
    Ok(storage)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
