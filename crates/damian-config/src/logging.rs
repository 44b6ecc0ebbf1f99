//! Bridge from the `debug` settings section to logging setup.

use damian_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, log_format_from_config};

use crate::service::ConfigStore;

/// Logging preferences read from the `debug` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Level directive handed to the env filter.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read `debug.log_level` and `debug.log_format`, falling back to the
    /// telemetry defaults.
    #[must_use]
    pub fn from_store(store: &ConfigStore) -> Self {
        let debug = store.get("debug");
        let level = debug
            .as_ref()
            .and_then(|section| section.get("log_level"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string();
        let format = log_format_from_config(debug.as_ref()).unwrap_or_else(LogFormat::infer);
        Self { level, format }
    }

    /// Configuration for [`damian_telemetry::init_logging`].
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            level: &self.level,
            format: self.format,
            build_sha: build_sha(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use std::sync::Arc;

    #[test]
    fn reads_debug_section() {
        let store = ConfigStore::new(Arc::new(MemoryBlobStore::new()));
        let defaults = LogSettings::from_store(&store);
        assert_eq!(defaults.level, "info");
        assert_eq!(defaults.format, LogFormat::Pretty);

        store.set("debug.log_level", "trace").unwrap();
        store.set("debug.log_format", "json").unwrap();
        let settings = LogSettings::from_store(&store);
        assert_eq!(settings.format, LogFormat::Json);
        let config = settings.logging_config();
        assert_eq!(config.level, "trace");
        assert_eq!(config.format, LogFormat::Json);
    }
}
