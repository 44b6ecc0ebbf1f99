//! The reactive settings store.
//!
//! # Design
//! - The live document sits behind a `std::sync::RwLock`; no lock is held
//!   across an await or while subscribers run.
//! - Mutations publish synchronously, then schedule one debounced write.
//!   Each new mutation aborts the pending timer. Once the timer has fired the
//!   task detaches itself from the pending slot so it can no longer be
//!   cancelled; an async write gate serializes blob-store writes.
//! - Blob-store failures never escape. A failed read serves the defaults
//!   without touching storage; read and write failures surface as
//!   `ConfigEvent::Error`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use damian_events::{
    ConfigEvent, DEFAULT_WATCH_CAPACITY, EventStream, SubscriberRegistry, Subscription,
};
use damian_telemetry::Metrics;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::defaults::{BACKUP_KEY, CONFIG_KEY, DEFAULT_DEBOUNCE, VERSION_KEY};
use crate::document::{assign, lookup, merged};
use crate::error::{ConfigError, ConfigResult, StorageResult, error_chain, value_kind};
use crate::migration::{Migrator, SchemaVersion};
use crate::model::{ConfigExport, LoadOutcome, StoreMetrics};
use crate::path::ConfigPath;
use crate::schema::Schema;
use crate::storage::BlobStore;

/// Tunables for a [`ConfigStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Quiet period between the last mutation and the persisted write.
    pub debounce: Duration,
    /// Defaults, validators and presets.
    pub schema: Schema,
    /// Transforms applied to outdated documents on load and import.
    pub migrator: Migrator,
    /// Optional Prometheus sink for store counters.
    pub metrics: Option<Metrics>,
    /// Buffer size of the async watch channel.
    pub watch_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            schema: Schema::damian(),
            migrator: Migrator::new(),
            metrics: None,
            watch_capacity: DEFAULT_WATCH_CAPACITY,
        }
    }
}

/// Builder for [`ConfigStore`].
pub struct ConfigStoreBuilder {
    storage: Arc<dyn BlobStore>,
    options: StoreOptions,
}

impl ConfigStoreBuilder {
    /// Override the debounce window.
    #[must_use]
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.options.debounce = debounce;
        self
    }

    /// Replace the schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.options.schema = schema;
        self
    }

    /// Install migration steps.
    #[must_use]
    pub fn migrator(mut self, migrator: Migrator) -> Self {
        self.options.migrator = migrator;
        self
    }

    /// Record store activity in `metrics`.
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.options.metrics = Some(metrics);
        self
    }

    /// Override the watch channel capacity (minimum 1).
    #[must_use]
    pub fn watch_capacity(mut self, capacity: usize) -> Self {
        self.options.watch_capacity = capacity;
        self
    }

    /// Construct the store. The document holds the defaults until
    /// [`ConfigStore::initialize`] runs.
    #[must_use]
    pub fn build(self) -> ConfigStore {
        ConfigStore::with_options(self.storage, self.options)
    }
}

/// Reactive settings store. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    storage: Arc<dyn BlobStore>,
    schema: Schema,
    migrator: Migrator,
    debounce: Duration,
    metrics: Option<Metrics>,
    document: RwLock<Value>,
    loaded: AtomicBool,
    subscribers: SubscriberRegistry,
    pending: Mutex<PendingSave>,
    write_gate: AsyncMutex<()>,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Default)]
struct PendingSave {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ConfigStore {
    /// Store over `storage` with default options.
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStore>) -> Self {
        Self::with_options(storage, StoreOptions::default())
    }

    /// Start building a store over `storage`.
    #[must_use]
    pub fn builder(storage: Arc<dyn BlobStore>) -> ConfigStoreBuilder {
        ConfigStoreBuilder {
            storage,
            options: StoreOptions::default(),
        }
    }

    /// Store over `storage` with explicit options.
    #[must_use]
    pub fn with_options(storage: Arc<dyn BlobStore>, options: StoreOptions) -> Self {
        let document = options.schema.defaults().clone();
        Self {
            inner: Arc::new(StoreInner {
                storage,
                migrator: options.migrator,
                debounce: options.debounce,
                metrics: options.metrics,
                document: RwLock::new(document),
                loaded: AtomicBool::new(false),
                subscribers: SubscriberRegistry::with_capacity(options.watch_capacity.max(1)),
                pending: Mutex::new(PendingSave::default()),
                write_gate: AsyncMutex::new(()),
                last_saved_at: Mutex::new(None),
                schema: options.schema,
            }),
        }
    }

    /// Load the persisted document, migrating it when its version tag is
    /// missing or stale. Never fails; unusable snapshots fall back to the
    /// defaults.
    ///
    /// When the blob store cannot be read the defaults are served from memory
    /// only: no backup, no migration and no immediate save, so the stored
    /// snapshot survives for the next launch.
    #[instrument(name = "config_store.initialize", skip(self))]
    pub async fn initialize(&self) -> LoadOutcome {
        let schema = &self.inner.schema;
        let (raw, stored_version) = match self.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let message = error_chain(&err);
                warn!(error = %message, "failed to read persisted settings; serving defaults");
                self.emit(ConfigEvent::Error {
                    operation: "load".to_string(),
                    message,
                });
                self.install(schema.defaults().clone());
                return self.announce(LoadOutcome::Defaults);
            }
        };
        let state = SchemaVersion::classify(stored_version.as_deref(), schema.version());

        if state.needs_migration()
            && let Some(raw) = raw.as_deref()
            && let Err(err) = self.inner.storage.set_item(BACKUP_KEY, raw).await
        {
            warn!(error = %error_chain(&err), "failed to back up settings before migration");
        }

        let restored = raw
            .as_deref()
            .and_then(|raw| self.restore(raw, &state));
        let outcome = match (&restored, state.needs_migration()) {
            (None, _) => LoadOutcome::Defaults,
            (Some(_), false) => LoadOutcome::Restored,
            (Some(_), true) => LoadOutcome::Migrated {
                from: state.stored().map(str::to_string),
            },
        };

        self.install(restored.unwrap_or_else(|| schema.defaults().clone()));
        if state.needs_migration() {
            self.cancel_pending();
            self.persist().await;
        }
        self.announce(outcome)
    }

    /// Value at `path`, or `None` when any segment is missing or the path is
    /// malformed.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let path = ConfigPath::parse(path).ok()?;
        lookup(&self.read_document(), &path).cloned()
    }

    /// Value at `path`, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).unwrap_or_else(|| default.into())
    }

    /// Value at `path` deserialized into `T`; `None` when absent or when the
    /// stored value has a different shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Write `value` at `path`, creating missing parents.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidPath`] for a malformed path.
    /// - [`ConfigError::ValidationFailed`] when the governing validator rejects
    ///   the value, or any leaf of an object value.
    /// - [`ConfigError::SectionNotObject`] when replacing a required section
    ///   with a non-object.
    ///
    /// A rejected write leaves the document untouched and emits nothing.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let path = ConfigPath::parse(path)?;
        let value = value.into();
        let schema = &self.inner.schema;

        if !schema.validators().accepts(&path.segment_refs(), &value) {
            return Err(self.rejected(ConfigError::ValidationFailed {
                path: path.to_string(),
                value,
            }));
        }
        if path.parents().is_empty()
            && !value.is_object()
            && schema.required_sections().any(|section| section == path.leaf())
        {
            return Err(self.rejected(ConfigError::SectionNotObject {
                section: path.to_string(),
                found: value_kind(&value),
            }));
        }
        if value.is_object() {
            schema
                .check_leaves_under(path.segments(), &value)
                .map_err(|err| self.rejected(err))?;
        }

        let assignment = assign(&mut self.write_document(), &path, value.clone());
        for clobbered in &assignment.clobbered {
            warn!(path = %path, clobbered = %clobbered, "replaced non-object value while creating parents");
        }
        debug!(path = %path, "setting changed");

        self.emit(ConfigEvent::Change {
            path: path.to_string(),
            value,
            old_value: assignment.previous,
        });
        self.schedule_save();
        Ok(())
    }

    /// Deep-merge `partial` onto the document.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotAnObject`] when `partial` is not an object.
    /// - [`ConfigError::MissingSection`] / [`ConfigError::SectionNotObject`]
    ///   when the merge would break a required section.
    /// - [`ConfigError::ValidationFailed`] when a leaf of `partial` is rejected.
    ///
    /// Failure is all-or-nothing.
    pub fn update(&self, partial: &Value) -> ConfigResult<()> {
        if !partial.is_object() {
            return Err(self.rejected(ConfigError::NotAnObject {
                context: "patch",
                found: value_kind(partial),
            }));
        }
        let schema = &self.inner.schema;
        schema
            .check_leaves(partial)
            .map_err(|err| self.rejected(err))?;

        let (config, old_config) = {
            let mut document = self.write_document();
            let candidate = merged(&document, partial);
            schema
                .validate_structure(&candidate)
                .map_err(|err| self.rejected(err))?;
            let old_config = std::mem::replace(&mut *document, candidate.clone());
            (candidate, old_config)
        };
        debug!("settings merged");

        self.emit(ConfigEvent::Update { config, old_config });
        self.schedule_save();
        Ok(())
    }

    /// Restore the defaults and delete the persisted snapshot.
    ///
    /// The in-memory reset always happens; removal failures are logged and
    /// emitted as [`ConfigEvent::Error`].
    #[instrument(name = "config_store.reset", skip(self))]
    pub async fn reset(&self) {
        self.cancel_pending();
        let config = self.inner.schema.defaults().clone();
        let old_config = std::mem::replace(&mut *self.write_document(), config.clone());
        self.emit(ConfigEvent::Reset { config, old_config });

        let _gate = self.inner.write_gate.lock().await;
        for key in [CONFIG_KEY, VERSION_KEY] {
            if let Err(err) = self.inner.storage.remove_item(key).await {
                let message = error_chain(&err);
                warn!(key, error = %message, "failed to remove persisted settings");
                self.emit(ConfigEvent::Error {
                    operation: "reset".to_string(),
                    message,
                });
            }
        }
        info!("settings reset to defaults");
    }

    /// Merge the named preset onto the document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownPreset`] for an unregistered name, otherwise any
    /// error from [`ConfigStore::update`].
    pub fn apply_preset(&self, name: &str) -> ConfigResult<()> {
        let Some(preset) = self.inner.schema.presets().get(name) else {
            return Err(ConfigError::UnknownPreset {
                name: name.to_string(),
            });
        };
        self.update(preset)?;
        info!(preset = name, "preset applied");
        Ok(())
    }

    /// Names of the registered presets.
    #[must_use]
    pub fn preset_names(&self) -> Vec<String> {
        self.inner.schema.presets().names()
    }

    /// Register a synchronous callback for every event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConfigEvent) + Send + Sync + 'static,
    {
        let subscription = self.inner.subscribers.subscribe(callback);
        self.record_subscribers();
        subscription
    }

    /// Number of registered synchronous callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Async stream of every event emitted from now on.
    #[must_use]
    pub fn watch(&self) -> EventStream {
        self.inner.subscribers.watch()
    }

    /// Copy of the live document.
    #[must_use]
    pub fn config(&self) -> Value {
        self.read_document().clone()
    }

    /// Whether [`ConfigStore::initialize`] has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst)
    }

    /// Schema the store validates against.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Versioned, timestamped copy of the document.
    #[must_use]
    pub fn export_config(&self) -> ConfigExport {
        ConfigExport {
            version: self.inner.schema.version().to_string(),
            timestamp: Utc::now(),
            config: self.config(),
        }
    }

    /// [`ConfigStore::export_config`] rendered as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if the export cannot be serialized.
    pub fn export_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(&self.export_config())
            .map_err(|source| ConfigError::Serialize { source })
    }

    /// Merge an exported snapshot onto the document, migrating it first when
    /// its version differs.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotAnObject`] when `snapshot` is not an object.
    /// - [`ConfigError::ImportMissingConfig`] when `config` is absent or not an
    ///   object.
    /// - Any error from [`ConfigStore::update`].
    #[instrument(name = "config_store.import", skip(self, snapshot))]
    pub fn import_config(&self, snapshot: &Value) -> ConfigResult<()> {
        let Some(fields) = snapshot.as_object() else {
            return Err(ConfigError::NotAnObject {
                context: "import",
                found: value_kind(snapshot),
            });
        };
        let Some(config) = fields.get("config").filter(|config| config.is_object()) else {
            return Err(ConfigError::ImportMissingConfig);
        };

        let mut config = config.clone();
        let version = fields.get("version").and_then(Value::as_str);
        let state = SchemaVersion::classify(version, self.inner.schema.version());
        if state.needs_migration() {
            let steps = self.inner.migrator.migrate(&state, &mut config);
            debug!(from = ?state.stored(), steps, "migrated imported settings");
        }
        self.update(&config)?;
        info!("settings imported");
        Ok(())
    }

    /// Parse and import a JSON export.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ImportParse`] for invalid JSON, otherwise any error from
    /// [`ConfigStore::import_config`].
    pub fn import_json(&self, json: &str) -> ConfigResult<()> {
        let snapshot: Value =
            serde_json::from_str(json).map_err(|source| ConfigError::ImportParse { source })?;
        self.import_config(&snapshot)
    }

    /// Diagnostics snapshot.
    #[must_use]
    pub fn metrics(&self) -> StoreMetrics {
        let serialized_bytes = serde_json::to_vec(&*self.read_document()).map_or(0, |bytes| bytes.len());
        StoreMetrics {
            loaded: self.is_loaded(),
            serialized_bytes,
            subscriber_count: self.subscriber_count(),
            version: self.inner.schema.version().to_string(),
            last_saved_at: *lock(&self.inner.last_saved_at),
            save_pending: lock(&self.inner.pending).handle.is_some(),
        }
    }

    /// Cancel the debounce timer and write the document now.
    #[instrument(name = "config_store.flush", skip(self))]
    pub async fn flush(&self) {
        self.cancel_pending();
        self.persist().await;
    }

    async fn read_snapshot(&self) -> StorageResult<(Option<String>, Option<String>)> {
        let storage = &self.inner.storage;
        let raw = storage.get_item(CONFIG_KEY).await?;
        let version = storage.get_item(VERSION_KEY).await?;
        Ok((raw, version))
    }

    fn install(&self, document: Value) {
        *self.write_document() = document;
        self.inner.loaded.store(true, Ordering::SeqCst);
    }

    fn announce(&self, outcome: LoadOutcome) -> LoadOutcome {
        info!(?outcome, version = self.inner.schema.version(), "settings loaded");
        let config = self.config();
        self.emit(ConfigEvent::Initialize { config });
        outcome
    }

    /// Parse, merge and migrate a stored snapshot. `None` means "use defaults".
    fn restore(&self, raw: &str, state: &SchemaVersion) -> Option<Value> {
        let schema = &self.inner.schema;
        let saved: Value = match serde_json::from_str(raw) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "persisted settings are not valid json; using defaults");
                return None;
            }
        };
        if !saved.is_object() {
            warn!(found = value_kind(&saved), "persisted settings are not an object; using defaults");
            return None;
        }

        let mut candidate = merged(schema.defaults(), &saved);
        if state.needs_migration() {
            let steps = self.inner.migrator.migrate(state, &mut candidate);
            info!(from = ?state.stored(), steps, "migrating persisted settings");
        }
        match schema.validate_structure(&candidate) {
            Ok(()) => Some(candidate),
            Err(err) => {
                warn!(error = ?err, "persisted settings are malformed; using defaults");
                None
            }
        }
    }

    fn schedule_save(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime available; skipping settings save");
            return;
        };
        let mut pending = lock(&self.inner.pending);
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;
        let store = self.clone();
        let debounce = self.inner.debounce;
        pending.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            if store.claim_pending(generation) {
                store.persist().await;
            }
        }));
    }

    /// Detach the timer task for `generation` from the pending slot.
    fn claim_pending(&self, generation: u64) -> bool {
        let mut pending = lock(&self.inner.pending);
        if pending.generation != generation {
            return false;
        }
        pending.handle = None;
        true
    }

    fn cancel_pending(&self) {
        let mut pending = lock(&self.inner.pending);
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
    }

    #[instrument(name = "config_store.persist", skip(self))]
    async fn persist(&self) {
        let _gate = self.inner.write_gate.lock().await;
        let config = self.config();
        let serialized = match serde_json::to_string(&config) {
            Ok(serialized) => serialized,
            Err(source) => {
                let err = ConfigError::Serialize { source };
                self.save_failed(error_chain(&err), 0);
                return;
            }
        };

        let storage = &self.inner.storage;
        let written = match storage.set_item(CONFIG_KEY, &serialized).await {
            Ok(()) => {
                storage
                    .set_item(VERSION_KEY, self.inner.schema.version())
                    .await
            }
            Err(err) => Err(err),
        };

        match written {
            Ok(()) => {
                *lock(&self.inner.last_saved_at) = Some(Utc::now());
                if let Some(metrics) = &self.inner.metrics {
                    metrics.record_save(true, serialized.len());
                }
                debug!(bytes = serialized.len(), "settings saved");
                self.emit(ConfigEvent::Save { config });
            }
            Err(err) => self.save_failed(error_chain(&err), serialized.len()),
        }
    }

    fn save_failed(&self, message: String, bytes: usize) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_save(false, bytes);
        }
        warn!(error = %message, "failed to save settings");
        self.emit(ConfigEvent::Error {
            operation: "save".to_string(),
            message,
        });
    }

    fn emit(&self, event: ConfigEvent) {
        let kind = event.kind();
        let report = self.inner.subscribers.publish(event);
        if let Some(metrics) = &self.inner.metrics {
            metrics.inc_event(kind);
            metrics.inc_subscriber_panics(report.failures.len());
        }
        self.record_subscribers();
    }

    fn record_subscribers(&self) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_subscribers(self.inner.subscribers.len());
        }
    }

    fn rejected(&self, err: ConfigError) -> ConfigError {
        if let Some(metrics) = &self.inner.metrics {
            metrics.inc_validation_rejection();
        }
        debug!(error = ?err, "settings change rejected");
        err
    }

    fn read_document(&self) -> RwLockReadGuard<'_, Value> {
        self.inner
            .document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_document(&self) -> RwLockWriteGuard<'_, Value> {
        self.inner
            .document
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConfigStore")
            .field("version", &self.inner.schema.version())
            .field("loaded", &self.is_loaded())
            .field("debounce", &self.inner.debounce)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
