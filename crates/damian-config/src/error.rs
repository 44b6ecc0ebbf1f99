//! Error types for settings operations.
//!
//! # Design
//! - Constant messages; context lives in structured fields.
//! - Storage failures are kept separate because they never reach callers of
//!   the store's public methods.

use std::error::Error as StdError;
use std::io;

use serde_json::Value;
use thiserror::Error;

/// Primary error type for settings operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration path could not be parsed.
    #[error("invalid configuration path")]
    InvalidPath {
        /// Path as supplied by the caller.
        path: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A registered validator rejected the value.
    #[error("configuration value rejected by validator")]
    ValidationFailed {
        /// Path the value was destined for.
        path: String,
        /// Offending value.
        value: Value,
    },
    /// An object was expected but a different JSON type was supplied.
    #[error("configuration payload must be an object")]
    NotAnObject {
        /// Which payload was inspected (`patch`, `import`, `document`).
        context: &'static str,
        /// JSON type that was found instead.
        found: &'static str,
    },
    /// A required top-level section is absent.
    #[error("required configuration section missing")]
    MissingSection {
        /// Name of the missing section.
        section: String,
    },
    /// A required top-level section is not an object.
    #[error("configuration section must be an object")]
    SectionNotObject {
        /// Name of the offending section.
        section: String,
        /// JSON type that was found instead.
        found: &'static str,
    },
    /// No preset is registered under the requested name.
    #[error("unknown configuration preset")]
    UnknownPreset {
        /// Preset name supplied by the caller.
        name: String,
    },
    /// An import payload lacks the `config` key.
    #[error("import payload is missing the config object")]
    ImportMissingConfig,
    /// An import payload was not valid JSON.
    #[error("import payload is not valid json")]
    ImportParse {
        /// Underlying parser error.
        source: serde_json::Error,
    },
    /// The live document could not be serialized.
    #[error("failed to serialize configuration")]
    Serialize {
        /// Underlying serializer error.
        source: serde_json::Error,
    },
}

/// Convenience alias for settings results.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by blob-store implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("blob store io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Key involved in the operation.
        key: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The key cannot be mapped onto the backing store.
    #[error("invalid blob store key")]
    InvalidKey {
        /// Key supplied by the caller.
        key: String,
    },
    /// The backing store refused the operation.
    #[error("blob store unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Key involved in the operation.
        key: String,
        /// Backend-provided detail.
        reason: String,
    },
}

/// Result alias for blob-store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Render an error and its sources as a single `a: b: c` line.
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        rendered.push_str(": ");
        rendered.push_str(&source.to_string());
        current = source.source();
    }
    rendered
}

/// Name of the JSON type held by `value`.
pub(crate) const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_chain_includes_sources() {
        let err = StorageError::Io {
            operation: "set_item",
            key: "damian.config".into(),
            source: io::Error::other("disk full"),
        };
        assert_eq!(error_chain(&err), "blob store io failure: disk full");
    }

    #[test]
    fn messages_are_constant() {
        let err = ConfigError::ValidationFailed {
            path: "audio.volume".into(),
            value: json!(4),
        };
        assert_eq!(err.to_string(), "configuration value rejected by validator");
        let err = ConfigError::UnknownPreset {
            name: "loud".into(),
        };
        assert_eq!(err.to_string(), "unknown configuration preset");
    }

    #[test]
    fn value_kind_names_json_types() {
        assert_eq!(value_kind(&json!(null)), "null");
        assert_eq!(value_kind(&json!(true)), "boolean");
        assert_eq!(value_kind(&json!(1.5)), "number");
        assert_eq!(value_kind(&json!("x")), "string");
        assert_eq!(value_kind(&json!([1])), "array");
        assert_eq!(value_kind(&json!({})), "object");
    }
}
