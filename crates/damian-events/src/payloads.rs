//! Event payload types emitted by the settings store.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Identifier assigned to each dispatched event.
pub type EventId = u64;

/// Identifier assigned to each registered subscriber.
pub type SubscriberId = u64;

/// Default buffer size for the async watch channel.
pub const DEFAULT_WATCH_CAPACITY: usize = 256;

/// Typed settings events delivered to subscribers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigEvent {
    /// The store finished loading and holds a fully-populated document.
    Initialize {
        /// Document after defaults, saved values and migrations were applied.
        config: Value,
    },
    /// A single path was written.
    Change {
        /// Dot-delimited path that was written.
        path: String,
        /// Value now stored at `path`.
        value: Value,
        /// Value previously stored at `path`, if any.
        old_value: Option<Value>,
    },
    /// A partial document was deep-merged onto the live document.
    Update {
        /// Document after the merge.
        config: Value,
        /// Document before the merge.
        old_config: Value,
    },
    /// The document was replaced with the defaults.
    Reset {
        /// Default document now in effect.
        config: Value,
        /// Document before the reset.
        old_config: Value,
    },
    /// A debounced or explicit save reached the blob store.
    Save {
        /// Document that was persisted.
        config: Value,
    },
    /// A blob-store operation failed; in-memory state is unaffected.
    Error {
        /// Operation that failed (for example `save` or `reset`).
        operation: String,
        /// Human-readable failure description.
        message: String,
    },
}

impl ConfigEvent {
    /// Machine-friendly discriminator for subscribers and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Change { .. } => "change",
            Self::Update { .. } => "update",
            Self::Reset { .. } => "reset",
            Self::Save { .. } => "save",
            Self::Error { .. } => "error",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned at dispatch.
    pub id: EventId,
    /// Wall-clock time the event was dispatched.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: ConfigEvent,
}
