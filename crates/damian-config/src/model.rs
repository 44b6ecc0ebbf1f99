//! Data carriers returned by the settings store.
//!
//! # Design
//! - Pure data; no IO.
//! - Section structs mirror the default document and are meant for
//!   `ConfigStore::get_as`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Portable snapshot produced by `export_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigExport {
    /// Schema version of the exported document.
    pub version: String,
    /// When the export was taken.
    pub timestamp: DateTime<Utc>,
    /// Full settings document.
    pub config: Value,
}

/// Point-in-time diagnostics for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    /// Whether `initialize` has completed.
    pub loaded: bool,
    /// Length of the document serialized as JSON.
    pub serialized_bytes: usize,
    /// Number of registered synchronous subscribers.
    pub subscriber_count: usize,
    /// Schema version in effect.
    pub version: String,
    /// Completion time of the last successful save.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Whether a debounced save is waiting to run.
    pub save_pending: bool,
}

/// How `initialize` arrived at the live document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Nothing usable was stored; defaults are in effect.
    Defaults,
    /// A current-version document was merged onto the defaults.
    Restored,
    /// A stored document was upgraded from an older or missing version tag.
    Migrated {
        /// Stored version tag, `None` for unversioned snapshots.
        from: Option<String>,
    },
}

/// Typed view of the `audio` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Master switch for sounds.
    pub enabled: bool,
    /// Volume between 0 and 1.
    pub volume: f64,
    /// Sound theme identifier.
    pub sound_theme: String,
    /// Play a sound when a timer finishes.
    pub timer_end_sound: bool,
    /// Play a tick every second.
    pub tick_sound: bool,
}

/// Typed view of the `haptics` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HapticSettings {
    /// Master switch for vibration.
    pub enabled: bool,
    /// `light`, `medium` or `heavy`.
    pub intensity: String,
    /// Vibrate when a switch is toggled.
    pub on_switch_toggle: bool,
    /// Vibrate when a timer finishes.
    pub on_timer_end: bool,
}

/// Typed view of the `timer` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Duration preselected for new timers.
    pub default_duration_secs: u32,
    /// Remaining time at which the warning cue fires.
    pub warning_secs: u32,
    /// One-tap durations offered on the timer screen.
    pub quick_presets_secs: Vec<u32>,
    /// Show the numeric countdown.
    pub show_remaining_time: bool,
    /// `circle`, `bar` or `hourglass`.
    pub visual_style: String,
}

/// Typed view of the `accessibility` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilitySettings {
    /// High-contrast palette.
    pub high_contrast: bool,
    /// Larger text throughout.
    pub large_text: bool,
    /// Extra screen-reader labels.
    pub screen_reader_hints: bool,
    /// Reduced interface with fewer controls.
    pub simplified_ui: bool,
}
