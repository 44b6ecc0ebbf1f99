//! Named partial documents applied on top of the live settings.

use std::collections::BTreeMap;

use serde_json::{Value, json};

/// Registry of preset profiles keyed by name.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: BTreeMap<String, Value>,
}

impl PresetRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets shipped with the DamianApp.
    #[must_use]
    pub fn damian() -> Self {
        let mut registry = Self::new();
        registry.register(
            "silent",
            json!({
                "audio": { "enabled": false },
                "haptics": { "enabled": false }
            }),
        );
        registry.register(
            "autism-friendly",
            json!({
                "audio": { "volume": 0.5, "sound_theme": "soft", "tick_sound": false },
                "haptics": { "intensity": "light" },
                "ui": { "reduced_motion": true, "animations_enabled": false },
                "timer": { "visual_style": "circle", "warning_secs": 120 },
                "accessibility": { "simplified_ui": true }
            }),
        );
        registry.register(
            "high-contrast",
            json!({
                "accessibility": { "high_contrast": true, "large_text": true },
                "ui": {
                    "font_scale": 1.3,
                    "colors": {
                        "primary": "#FFD600",
                        "background": "#000000",
                        "text": "#FFFFFF"
                    }
                }
            }),
        );
        registry.register(
            "low-power",
            json!({
                "performance": { "target_fps": 30, "low_power_mode": true, "preload_images": false },
                "ui": { "animations_enabled": false }
            }),
        );
        registry
    }

    /// Register or replace a preset.
    pub fn register(&mut self, name: impl Into<String>, partial: Value) {
        self.presets.insert(name.into(), partial);
    }

    /// Look up a preset by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.presets.get(name)
    }

    /// Registered preset names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damian_presets_are_registered() {
        let presets = PresetRegistry::damian();
        assert_eq!(
            presets.names(),
            vec!["autism-friendly", "high-contrast", "low-power", "silent"]
        );
        assert_eq!(presets.get("silent").unwrap()["audio"]["enabled"], false);
        assert!(presets.get("party").is_none());
    }

    #[test]
    fn register_replaces_existing_preset() {
        let mut presets = PresetRegistry::new();
        presets.register("night", json!({"ui": {"theme": "dark"}}));
        presets.register("night", json!({"ui": {"theme": "light"}}));
        assert_eq!(presets.names().len(), 1);
        assert_eq!(presets.get("night").unwrap()["ui"]["theme"], "light");
    }
}
