//! Prometheus Metrics Module
//!
//! Stream activity counters recorded through the `metrics` facade. Without
//! an installed recorder every call is a no-op, so library users pay
//! nothing unless they call [`init_metrics`] (the binary does).
//!
//! # Metrics
//!
//! - `v20_stream_frames_total{stream}`: frames decoded
//! - `v20_stream_messages_total{stream}`: prices or transactions delivered
//! - `v20_stream_heartbeats_total{stream}`: heartbeats delivered
//! - `v20_stream_handler_errors_total{stream}`: frames whose routing failed
//! - `v20_stream_sessions_closed_total{stream,reason}`: sessions closed
//! - `v20_stream_sessions_active{stream}`: sessions with a live read loop
//! - `v20_stream_session_duration_seconds{stream}`: session lifetimes

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::StreamKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder was installed first.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!("v20_stream_frames_total", "Frames decoded from stream bodies");
    describe_counter!(
        "v20_stream_messages_total",
        "Prices or transactions delivered to handlers"
    );
    describe_counter!(
        "v20_stream_heartbeats_total",
        "Heartbeats delivered to handlers"
    );
    describe_counter!(
        "v20_stream_handler_errors_total",
        "Frames that failed to decode or whose handler returned an error"
    );
    describe_counter!(
        "v20_stream_sessions_closed_total",
        "Stream sessions closed, by reason"
    );
    describe_gauge!(
        "v20_stream_sessions_active",
        "Stream sessions with a running read loop"
    );
    describe_histogram!(
        "v20_stream_session_duration_seconds",
        "Lifetime of stream sessions"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record frames decoded by a session.
pub fn record_frames(stream: StreamKind, count: u64) {
    counter!("v20_stream_frames_total", "stream" => stream.as_str()).increment(count);
}

/// Record a message delivered to a handler.
pub fn record_message(stream: StreamKind) {
    counter!("v20_stream_messages_total", "stream" => stream.as_str()).increment(1);
}

/// Record a heartbeat delivered to a handler.
pub fn record_heartbeat(stream: StreamKind) {
    counter!("v20_stream_heartbeats_total", "stream" => stream.as_str()).increment(1);
}

/// Record a frame whose routing failed.
pub fn record_handler_error(stream: StreamKind) {
    counter!("v20_stream_handler_errors_total", "stream" => stream.as_str()).increment(1);
}

/// Record a session read loop starting.
pub fn record_session_opened(stream: StreamKind) {
    gauge!("v20_stream_sessions_active", "stream" => stream.as_str()).increment(1.0);
}

/// Record a session read loop exiting.
pub fn record_session_closed(stream: StreamKind, reason: &'static str, lifetime: Duration) {
    gauge!("v20_stream_sessions_active", "stream" => stream.as_str()).decrement(1.0);
    counter!(
        "v20_stream_sessions_closed_total",
        "stream" => stream.as_str(),
        "reason" => reason
    )
    .increment(1);
    histogram!(
        "v20_stream_session_duration_seconds",
        "stream" => stream.as_str()
    )
    .record(lifetime.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
