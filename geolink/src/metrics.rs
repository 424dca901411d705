//! Prometheus metrics instrumentation for geolink.
//!
//! This module provides Prometheus metrics for monitoring the control layer.
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `geolink_bridges_opened_total` - Total number of bridges opened
//! - `geolink_sessions_started_total` - Total number of execution sessions started
//! - `geolink_catalog_populations_total` - Total number of catalog populations
//! - `geolink_operation_calls_total` - Total number of remote operation calls
#![cfg(feature = "metrics")]

use prometheus::{Counter, CounterVec, Opts, Registry};
use std::sync::LazyLock;

/// Global Prometheus registry for geolink metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for total bridges opened.
///
/// Labels:
/// - `endpoint`: The bridge endpoint
pub static BRIDGES_OPENED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("geolink_bridges_opened_total", "Total number of bridges opened");
    CounterVec::new(opts, &["endpoint"])
        .expect("geolink_bridges_opened_total metric creation failed")
});

/// Counter for total execution sessions started.
///
/// Labels:
/// - `mode`: The execution mode (local, distributed-cluster)
pub static SESSIONS_STARTED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "geolink_sessions_started_total",
        "Total number of execution sessions started",
    );
    CounterVec::new(opts, &["mode"])
        .expect("geolink_sessions_started_total metric creation failed")
});

/// Counter for total operation catalog populations.
pub static CATALOG_POPULATIONS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        "geolink_catalog_populations_total",
        "Total number of operation catalog populations",
    );
    Counter::with_opts(opts)
        .expect("geolink_catalog_populations_total metric creation failed")
});

/// Counter for total remote operation calls.
///
/// Labels:
/// - `operation`: The operation name
pub static OPERATION_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "geolink_operation_calls_total",
        "Total number of remote operation calls",
    );
    CounterVec::new(opts, &["operation"])
        .expect("geolink_operation_calls_total metric creation failed")
});

/// Initialize all metrics by registering them with the global registry.
///
/// This function is idempotent - calling it multiple times is safe.
/// It is automatically called when metrics are first used.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(BRIDGES_OPENED_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(SESSIONS_STARTED_TOTAL.clone()),
        Box::new(CATALOG_POPULATIONS_TOTAL.clone()),
        Box::new(OPERATION_CALLS_TOTAL.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            let msg = e.to_string();
            if !msg.contains("Duplicate metrics collector registration attempted") {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Helper to record a bridge open event.
pub fn record_bridge_opened(endpoint: &str) {
    BRIDGES_OPENED_TOTAL.with_label_values(&[endpoint]).inc();
}

/// Helper to record a session start event.
pub fn record_session_started(mode: &str) {
    SESSIONS_STARTED_TOTAL.with_label_values(&[mode]).inc();
}

/// Helper to record a catalog population.
pub fn record_catalog_populated() {
    CATALOG_POPULATIONS_TOTAL.inc();
}

/// Helper to record a remote operation call.
pub fn record_operation_call(operation: &str) {
    OPERATION_CALLS_TOTAL.with_label_values(&[operation]).inc();
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        // Should not panic
        init_metrics().expect("metrics initialization should succeed");
    }

    #[test]
    fn test_record_bridge_opened() {
        record_bridge_opened("engine-host:7654");
    }

    #[test]
    fn test_record_session_started() {
        record_session_started("local");
        record_session_started("distributed-cluster");
    }

    #[test]
    fn test_record_catalog_populated() {
        record_catalog_populated();
    }

    #[test]
    fn test_record_operation_call() {
        record_operation_call("load_image");
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics().expect("metrics initialization should succeed");

        record_bridge_opened("local");
        record_session_started("local");

        let output = gather_metrics().expect("gather should succeed");
        assert!(output.contains("geolink_bridges_opened_total"));
        assert!(output.contains("geolink_sessions_started_total"));
    }
}
