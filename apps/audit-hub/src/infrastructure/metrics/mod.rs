//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Calls**: Audited calls by ACL outcome
//! - **Subscribers**: Active observer streams
//! - **Delivery**: Events dropped for full mailboxes, statistics flushes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
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

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "audit_hub_events_total",
        "Total audited calls by ACL outcome"
    );
    describe_counter!(
        "audit_hub_calls_denied_total",
        "Total calls rejected by the ACL"
    );
    describe_counter!(
        "audit_hub_events_dropped_total",
        "Total events dropped for full subscriber mailboxes"
    );
    describe_counter!(
        "audit_hub_stat_flushes_total",
        "Total statistics windows flushed to clients"
    );
    describe_gauge!(
        "audit_hub_subscribers",
        "Number of registered observer mailboxes"
    );
    describe_gauge!(
        "audit_hub_streams",
        "Number of running observer streams by kind"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for observer stream kinds.
#[derive(Debug, Clone, Copy)]
pub enum StreamKind {
    /// Raw event log.
    Logging,
    /// Windowed statistics.
    Statistics,
}

impl StreamKind {
    /// Label value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Logging => "logging",
            Self::Statistics => "statistics",
        }
    }
}

/// Record one audited call.
pub fn record_call(allowed: bool) {
    counter!(
        "audit_hub_events_total",
        "allowed" => if allowed { "true" } else { "false" }
    )
    .increment(1);
    if !allowed {
        counter!("audit_hub_calls_denied_total").increment(1);
    }
}

/// Record events dropped for full mailboxes.
pub fn record_events_dropped(count: u64) {
    counter!("audit_hub_events_dropped_total").increment(count);
}

/// Record one statistics flush.
pub fn record_stat_flush() {
    counter!("audit_hub_stat_flushes_total").increment(1);
}

/// Update the registered subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("audit_hub_subscribers").set(count as f64);
}

/// Track a stream starting.
pub fn stream_started(kind: StreamKind) {
    gauge!("audit_hub_streams", "kind" => kind.as_str()).increment(1.0);
}

/// Track a stream finishing.
pub fn stream_finished(kind: StreamKind) {
    gauge!("audit_hub_streams", "kind" => kind.as_str()).decrement(1.0);
}

// =============================================================================
// Tests
// =============================================================================
