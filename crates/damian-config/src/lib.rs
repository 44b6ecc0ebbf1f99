#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Reactive, persisted settings store for the DamianApp.
//!
//! The store owns a nested JSON document with fixed top-level sections,
//! exposes path-based reads and validated writes, notifies subscribers
//! synchronously, and persists write-behind to an async [`BlobStore`].
//!
//! Layout: `path.rs` (dot-delimited paths), `document.rs` (lookup, assign,
//! deep merge), `validate.rs` (validator trie + built-ins), `schema.rs`
//! (defaults, validators and presets bundled), `migration.rs` (version tags
//! and transforms), `storage.rs` (blob stores), `model.rs` (export and
//! diagnostics payloads), `service.rs` (`ConfigStore`), `logging.rs` (debug
//! section to logging setup).

pub mod defaults;
pub mod document;
pub mod error;
pub mod logging;
pub mod migration;
pub mod model;
pub mod path;
pub mod presets;
pub mod schema;
pub mod service;
pub mod storage;
pub mod validate;

pub use damian_events::{ConfigEvent, EventEnvelope, EventStream, Subscription};
pub use defaults::{
    BACKUP_KEY, CONFIG_KEY, DEFAULT_DEBOUNCE, SCHEMA_VERSION, VERSION_KEY, default_document,
};
pub use error::{ConfigError, ConfigResult, StorageError, StorageResult};
pub use logging::LogSettings;
pub use migration::{Migrator, SchemaVersion};
pub use model::{
    AccessibilitySettings, AudioSettings, ConfigExport, HapticSettings, LoadOutcome,
    StoreMetrics, TimerSettings,
};
pub use path::ConfigPath;
pub use presets::PresetRegistry;
pub use schema::Schema;
pub use service::{ConfigStore, ConfigStoreBuilder, StoreOptions};
pub use storage::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use validate::{Validator, ValidatorRegistry};
