//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to the settings store.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the workspace.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    config_events_total: IntCounterVec,
    config_saves_total: IntCounterVec,
    config_validation_rejections_total: IntCounter,
    config_subscriber_panics_total: IntCounter,
    config_subscribers: IntGauge,
    config_document_bytes: IntGauge,
}

/// Snapshot of selected gauges and counters for diagnostics screens.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Saves that reached the blob store.
    pub saves_succeeded: u64,
    /// Saves rejected by the blob store.
    pub saves_failed: u64,
    /// Writes rejected by a validator or structural check.
    pub validation_rejections: u64,
    /// Subscriber callbacks that panicked.
    pub subscriber_panics: u64,
    /// Current number of synchronous subscribers.
    pub subscribers: i64,
    /// Size of the last persisted document in bytes.
    pub document_bytes: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let config_events_total = IntCounterVec::new(
            Opts::new("config_events_total", "Settings events dispatched by kind"),
            &["kind"],
        )
        .map_err(|source| collector_error("config_events_total", source))?;
        let config_saves_total = IntCounterVec::new(
            Opts::new("config_saves_total", "Settings saves by outcome"),
            &["status"],
        )
        .map_err(|source| collector_error("config_saves_total", source))?;
        let config_validation_rejections_total = IntCounter::with_opts(Opts::new(
            "config_validation_rejections_total",
            "Settings writes rejected by validation",
        ))
        .map_err(|source| collector_error("config_validation_rejections_total", source))?;
        let config_subscriber_panics_total = IntCounter::with_opts(Opts::new(
            "config_subscriber_panics_total",
            "Settings subscriber callbacks that panicked",
        ))
        .map_err(|source| collector_error("config_subscriber_panics_total", source))?;
        let config_subscribers = IntGauge::with_opts(Opts::new(
            "config_subscribers",
            "Registered settings subscribers",
        ))
        .map_err(|source| collector_error("config_subscribers", source))?;
        let config_document_bytes = IntGauge::with_opts(Opts::new(
            "config_document_bytes",
            "Size of the last persisted settings document",
        ))
        .map_err(|source| collector_error("config_document_bytes", source))?;

        register(&registry, "config_events_total", config_events_total.clone())?;
        register(&registry, "config_saves_total", config_saves_total.clone())?;
        register(
            &registry,
            "config_validation_rejections_total",
            config_validation_rejections_total.clone(),
        )?;
        register(
            &registry,
            "config_subscriber_panics_total",
            config_subscriber_panics_total.clone(),
        )?;
        register(&registry, "config_subscribers", config_subscribers.clone())?;
        register(
            &registry,
            "config_document_bytes",
            config_document_bytes.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                config_events_total,
                config_saves_total,
                config_validation_rejections_total,
                config_subscriber_panics_total,
                config_subscribers,
                config_document_bytes,
            }),
        })
    }

    /// Increment the dispatched event counter for the given kind.
    pub fn inc_event(&self, kind: &str) {
        self.inner
            .config_events_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a save outcome and, on success, the persisted document size.
    pub fn record_save(&self, succeeded: bool, bytes: usize) {
        let status = if succeeded { "ok" } else { "failed" };
        self.inner
            .config_saves_total
            .with_label_values(&[status])
            .inc();
        if succeeded {
            self.inner
                .config_document_bytes
                .set(i64::try_from(bytes).unwrap_or(i64::MAX));
        }
    }

    /// Increment the validation rejection counter.
    pub fn inc_validation_rejection(&self) {
        self.inner.config_validation_rejections_total.inc();
    }

    /// Increment the subscriber panic counter by `count`.
    pub fn inc_subscriber_panics(&self, count: usize) {
        self.inner
            .config_subscriber_panics_total
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }

    /// Set the subscriber gauge.
    pub fn set_subscribers(&self, count: usize) {
        self.inner
            .config_subscribers
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            saves_succeeded: self
                .inner
                .config_saves_total
                .with_label_values(&["ok"])
                .get(),
            saves_failed: self
                .inner
                .config_saves_total
                .with_label_values(&["failed"])
                .get(),
            validation_rejections: self.inner.config_validation_rejections_total.get(),
            subscriber_panics: self.inner.config_subscriber_panics_total.get(),
            subscribers: self.inner.config_subscribers.get(),
            document_bytes: self.inner.config_document_bytes.get(),
        }
    }
}

fn collector_error(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_event("change");
        metrics.record_save(true, 512);
        metrics.record_save(false, 0);
        metrics.inc_validation_rejection();
        metrics.inc_subscriber_panics(2);
        metrics.set_subscribers(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.saves_succeeded, 1);
        assert_eq!(snapshot.saves_failed, 1);
        assert_eq!(snapshot.validation_rejections, 1);
        assert_eq!(snapshot.subscriber_panics, 2);
        assert_eq!(snapshot.subscribers, 3);
        assert_eq!(snapshot.document_bytes, 512);

        let rendered = metrics.render()?;
        assert!(rendered.contains("config_events_total"));
        assert!(rendered.contains("config_saves_total"));
        assert!(rendered.contains("config_validation_rejections_total"));
        Ok(())
    }

    #[test]
    fn failed_save_keeps_last_document_size() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.record_save(true, 100);
        metrics.record_save(false, 9_999);
        assert_eq!(metrics.snapshot().document_bytes, 100);
        Ok(())
    }
}
