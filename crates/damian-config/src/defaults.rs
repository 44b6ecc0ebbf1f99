//! Default document, storage keys and timing for the settings store.
//!
//! # Design
//! - Centralise reserved blob-store keys so persistence and tests agree.
//! - The default document lists every required top-level section.

use std::time::Duration;

use serde_json::{Value, json};

/// Schema version written next to every persisted document.
pub const SCHEMA_VERSION: &str = "1.0.0";
/// Blob-store key holding the serialized document.
pub const CONFIG_KEY: &str = "damian.config";
/// Blob-store key holding the schema version tag.
pub const VERSION_KEY: &str = "damian.config.version";
/// Blob-store key holding the document as it was before a migration.
pub const BACKUP_KEY: &str = "damian.config.backup";
/// Quiet period between the last mutation and the persisted write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Factory defaults for the DamianApp.
#[must_use]
pub fn default_document() -> Value {
    json!({
        "app": {
            "name": "DamianApp",
            "version": SCHEMA_VERSION,
            "language": "es",
            "first_launch": true,
            "onboarding_completed": false
        },
        "ui": {
            "theme": "auto",
            "font_scale": 1.0,
            "animations_enabled": true,
            "reduced_motion": false,
            "colors": {
                "primary": "#4A90E2",
                "secondary": "#7ED321",
                "background": "#FFFFFF",
                "text": "#333333"
            }
        },
        "audio": {
            "enabled": true,
            "volume": 0.8,
            "sound_theme": "soft",
            "timer_end_sound": true,
            "tick_sound": false
        },
        "haptics": {
            "enabled": true,
            "intensity": "medium",
            "on_switch_toggle": true,
            "on_timer_end": true
        },
        "timer": {
            "default_duration_secs": 300,
            "warning_secs": 60,
            "quick_presets_secs": [60, 300, 600, 900],
            "show_remaining_time": true,
            "visual_style": "circle"
        },
        "switches": {
            "columns": 3,
            "sound_on_toggle": true,
            "custom_images": true
        },
        "accessibility": {
            "high_contrast": false,
            "large_text": false,
            "screen_reader_hints": true,
            "simplified_ui": false
        },
        "performance": {
            "target_fps": 60,
            "low_power_mode": false,
            "preload_images": true
        },
        "debug": {
            "enabled": false,
            "log_level": "info",
            "log_format": "pretty",
            "show_metrics": false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_section_is_an_object() {
        let document = default_document();
        let sections = document.as_object().expect("root object");
        assert_eq!(sections.len(), 9);
        assert!(sections.values().all(Value::is_object));
    }

    #[test]
    fn storage_keys_are_distinct() {
        assert_ne!(CONFIG_KEY, VERSION_KEY);
        assert_ne!(CONFIG_KEY, BACKUP_KEY);
        assert_ne!(VERSION_KEY, BACKUP_KEY);
    }
}
