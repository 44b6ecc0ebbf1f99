//! Failures raised while wiring up settings observability.
//!
//! Messages are constant; the collector name and the underlying cause travel
//! as fields and `source()`.

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for logging and metrics setup.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors from log subscriber installation and the Prometheus registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global log subscriber was already installed, or installation failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Cause reported by `tracing-subscriber`.
        #[source]
        source: TryInitError,
    },
    /// A settings collector had invalid options.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Collector name, e.g. `config_saves_total`.
        name: &'static str,
        /// Cause reported by Prometheus.
        #[source]
        source: PrometheusError,
    },
    /// A settings collector clashed with one already in the registry.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Collector name, e.g. `config_saves_total`.
        name: &'static str,
        /// Cause reported by Prometheus.
        #[source]
        source: PrometheusError,
    },
    /// The text exposition encoder failed.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Cause reported by Prometheus.
        #[source]
        source: PrometheusError,
    },
    /// The exposition buffer was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Conversion failure.
        #[source]
        source: std::string::FromUtf8Error,
    },
}
