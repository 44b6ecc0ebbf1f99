//! Defaults, validators and presets bundled as one schema.
//!
//! # Design
//! - Structural validity means every default top-level section exists as an
//!   object; leaf validity is delegated to the validator registry.

use serde_json::Value;

use crate::defaults::{SCHEMA_VERSION, default_document};
use crate::document::leaves_under;
use crate::error::{ConfigError, ConfigResult, value_kind};
use crate::presets::PresetRegistry;
use crate::validate::{
    ValidatorRegistry, array_of, boolean, hex_color, integer_in, integer_one_of, non_empty_string,
    number_in, one_of,
};

/// Complete description of a settings document.
#[derive(Debug, Clone)]
pub struct Schema {
    version: String,
    defaults: Value,
    validators: ValidatorRegistry,
    presets: PresetRegistry,
}

impl Schema {
    /// Assemble a schema from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAnObject`] when `defaults` is not an object.
    pub fn new(
        version: impl Into<String>,
        defaults: Value,
        validators: ValidatorRegistry,
        presets: PresetRegistry,
    ) -> ConfigResult<Self> {
        if !defaults.is_object() {
            return Err(ConfigError::NotAnObject {
                context: "defaults",
                found: value_kind(&defaults),
            });
        }
        Ok(Self {
            version: version.into(),
            defaults,
            validators,
            presets,
        })
    }

    /// The DamianApp schema.
    #[must_use]
    pub fn damian() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            defaults: default_document(),
            validators: damian_validators(),
            presets: PresetRegistry::damian(),
        }
    }

    /// Version tag persisted alongside documents of this schema.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Default document.
    #[must_use]
    pub const fn defaults(&self) -> &Value {
        &self.defaults
    }

    /// Validator registry.
    #[must_use]
    pub const fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    /// Mutable validator registry, for registering app-specific checks.
    pub const fn validators_mut(&mut self) -> &mut ValidatorRegistry {
        &mut self.validators
    }

    /// Preset registry.
    #[must_use]
    pub const fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    /// Mutable preset registry.
    pub const fn presets_mut(&mut self) -> &mut PresetRegistry {
        &mut self.presets
    }

    /// Top-level sections every document must carry.
    pub fn required_sections(&self) -> impl Iterator<Item = &str> {
        self.defaults
            .as_object()
            .into_iter()
            .flat_map(|sections| sections.keys().map(String::as_str))
    }

    /// Check that `document` is an object holding every required section as
    /// an object.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate_structure(&self, document: &Value) -> ConfigResult<()> {
        let Some(sections) = document.as_object() else {
            return Err(ConfigError::NotAnObject {
                context: "document",
                found: value_kind(document),
            });
        };
        for section in self.required_sections() {
            match sections.get(section) {
                None => {
                    return Err(ConfigError::MissingSection {
                        section: section.to_string(),
                    });
                }
                Some(value) if !value.is_object() => {
                    return Err(ConfigError::SectionNotObject {
                        section: section.to_string(),
                        found: value_kind(value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Run the registered validators over every leaf of `patch`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] for the first rejected leaf.
    pub fn check_leaves(&self, patch: &Value) -> ConfigResult<()> {
        self.check_leaves_under(&[], patch)
    }

    /// [`Schema::check_leaves`] for an object written at `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] for the first rejected leaf.
    pub fn check_leaves_under(&self, prefix: &[String], patch: &Value) -> ConfigResult<()> {
        for (path, value) in leaves_under(prefix, patch) {
            if !self.validators.accepts(&path.segment_refs(), value) {
                return Err(ConfigError::ValidationFailed {
                    path: path.to_string(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::damian()
    }
}

const MAX_DURATION_SECS: i64 = 86_400;

fn damian_validators() -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::new();
    let rules = [
        ("*.enabled", boolean()),
        ("app.name", non_empty_string()),
        ("app.language", one_of(&["es", "en"])),
        ("ui.theme", one_of(&["light", "dark", "auto"])),
        ("ui.font_scale", number_in(0.5, 2.0)),
        ("ui.colors.*", hex_color()),
        ("audio.volume", number_in(0.0, 1.0)),
        (
            "audio.sound_theme",
            one_of(&["soft", "classic", "nature", "none"]),
        ),
        ("haptics.intensity", one_of(&["light", "medium", "heavy"])),
        (
            "timer.default_duration_secs",
            integer_in(1, MAX_DURATION_SECS),
        ),
        ("timer.warning_secs", integer_in(0, 3_600)),
        (
            "timer.quick_presets_secs",
            array_of(integer_in(1, MAX_DURATION_SECS)),
        ),
        ("timer.visual_style", one_of(&["circle", "bar", "hourglass"])),
        ("switches.columns", integer_in(1, 6)),
        ("performance.target_fps", integer_one_of(&[30, 60, 120])),
        (
            "debug.log_level",
            one_of(&["trace", "debug", "info", "warn", "error"]),
        ),
        ("debug.log_format", one_of(&["pretty", "json"])),
    ];
    for (pattern, validator) in rules {
        registry.insert(pattern.split('.'), validator);
    }
    registry
}
