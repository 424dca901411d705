//! Tracing and telemetry instrumentation for geolink.
//!
//! This module provides helper functions for creating tracing spans and
//! recording metrics during controller lifecycle events. All functions work
//! both with and without the `metrics` feature flag.
//!
//! # Features
//!
//! - Tracing spans for the bridge and session lifecycle: open, start, stop
//! - Spans for remote operation dispatch
//! - Integration with the `metrics` module for Prometheus metrics
//! - Helper functions that are no-ops when features are disabled
//!
//! # Example
//!
//! ```ignore
//! use geolink::telemetry::{session_start_span, record_bridge_opened};
//!
//! let span = session_start_span("analysis", "distributed-cluster");
//! let _enter = span.enter();
//! // ... session startup
//! record_bridge_opened("engine-host:7654");
//! ```

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Create a tracing span for bridge open operations.
///
/// The span includes the endpoint as a field for observability.
#[must_use]
pub fn bridge_open_span(endpoint: impl AsRef<str>) -> Span {
    info_span!(
        "geolink.bridge_open",
        endpoint = %endpoint.as_ref(),
    )
}

/// Create a tracing span for session start operations.
///
/// The span includes the job name and execution mode as fields.
#[must_use]
pub fn session_start_span(job_name: impl AsRef<str>, mode: impl AsRef<str>) -> Span {
    info_span!(
        "geolink.session_start",
        job_name = %job_name.as_ref(),
        mode = %mode.as_ref(),
    )
}

/// Create a tracing span for controller teardown.
#[must_use]
pub fn session_stop_span(job_name: impl AsRef<str>) -> Span {
    info_span!(
        "geolink.session_stop",
        job_name = %job_name.as_ref(),
    )
}

/// Create a tracing span for a remote operation call.
///
/// The span includes the operation and target name as fields.
#[must_use]
pub fn operation_span(operation: impl AsRef<str>, target: impl AsRef<str>) -> Span {
    info_span!(
        "geolink.operation",
        operation = %operation.as_ref(),
        target = %target.as_ref(),
    )
}

/// Instrument a future with a remote operation span.
///
/// This is a convenience wrapper that attaches an operation span to any
/// future.
pub fn instrument_operation<F>(
    operation: impl AsRef<str>,
    target: impl AsRef<str>,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let span = operation_span(operation, target);
    future.instrument(span)
}

/// Record a bridge open event.
///
/// This function records the event both in tracing logs and in Prometheus
/// metrics (when the `metrics` feature is enabled).
pub fn record_bridge_opened(endpoint: impl AsRef<str>) {
    tracing::info!(
        endpoint = %endpoint.as_ref(),
        "bridge opened"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_bridge_opened(endpoint.as_ref());
}

/// Record a session start event.
pub fn record_session_started(mode: impl AsRef<str>) {
    tracing::info!(
        mode = %mode.as_ref(),
        "session started"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_session_started(mode.as_ref());
}

/// Record a remote operation call.
pub fn record_operation_call(operation: impl AsRef<str>) {
    tracing::debug!(
        operation = %operation.as_ref(),
        "remote operation called"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_operation_call(operation.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Install a silent subscriber so spans are enabled and carry metadata.
    ///
    /// Without an installed subscriber, tracing builds a `Span::none()` whose
    /// `metadata()` is `None`; the returned guard keeps the subscriber active
    /// for the duration of the test.
    fn enabling_guard() -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry())
    }

    #[test]
    fn test_bridge_open_span() {
        let _guard = enabling_guard();
        let span = bridge_open_span("engine-host:7654");
        assert_eq!(span.metadata().unwrap().name(), "geolink.bridge_open");
    }

    #[test]
    fn test_session_start_span() {
        let _guard = enabling_guard();
        let span = session_start_span("analysis", "distributed-cluster");
        assert_eq!(span.metadata().unwrap().name(), "geolink.session_start");
    }

    #[test]
    fn test_session_stop_span() {
        let _guard = enabling_guard();
        let span = session_stop_span("analysis");
        assert_eq!(span.metadata().unwrap().name(), "geolink.session_stop");
    }

    #[test]
    fn test_operation_span() {
        let _guard = enabling_guard();
        let span = operation_span("load_image", "elevation-conus");
        assert_eq!(span.metadata().unwrap().name(), "geolink.operation");
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        record_bridge_opened("local");
        record_session_started("local");
        record_operation_call("create_points");
    }
}
