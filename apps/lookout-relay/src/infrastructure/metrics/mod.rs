//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Sessions**: relay sessions opened and currently streaming
//! - **Events**: pipeline events received, forwarded, and dropped
//! - **Snapshots**: paginated pages read, enrichment lookups skipped
//! - **Throttling**: requests rejected by the rate limiter
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::event::EventKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
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
        "lookout_relay_events_received_total",
        "Pipeline events received, by kind"
    );
    describe_counter!(
        "lookout_relay_events_forwarded_total",
        "Events forwarded to browser channels, by kind"
    );
    describe_counter!(
        "lookout_relay_frames_dropped_total",
        "Pipeline frames dropped as unknown or malformed"
    );
    describe_counter!(
        "lookout_relay_snapshot_pages_total",
        "Paginated snapshot pages fetched"
    );
    describe_counter!(
        "lookout_relay_enrichment_misses_total",
        "Individual enrichment lookups skipped after errors"
    );
    describe_counter!(
        "lookout_relay_rate_limited_total",
        "API requests rejected by the rate limiter"
    );

    describe_gauge!(
        "lookout_relay_sessions_active",
        "Relay sessions currently streaming"
    );
    describe_gauge!(
        "lookout_relay_pipeline_connections",
        "Upstream pipeline connections currently open"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

const fn kind_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Online => "online",
        EventKind::Offline => "offline",
        EventKind::LocationChanged => "location",
        EventKind::ProfileUpdated => "update",
    }
}

/// Record a classified event received from the pipeline.
pub fn record_event_received(kind: EventKind) {
    counter!(
        "lookout_relay_events_received_total",
        "kind" => kind_label(kind)
    )
    .increment(1);
}

/// Record an event forwarded to a browser channel.
pub fn record_event_forwarded(kind: EventKind) {
    counter!(
        "lookout_relay_events_forwarded_total",
        "kind" => kind_label(kind)
    )
    .increment(1);
}

/// Record a dropped pipeline frame (unknown type or malformed payload).
pub fn record_frame_dropped() {
    counter!("lookout_relay_frames_dropped_total").increment(1);
}

/// Record one fetched snapshot page.
pub fn record_snapshot_page() {
    counter!("lookout_relay_snapshot_pages_total").increment(1);
}

/// Record one skipped enrichment lookup.
pub fn record_enrichment_miss() {
    counter!("lookout_relay_enrichment_misses_total").increment(1);
}

/// Record one rate-limited request.
pub fn record_rate_limited() {
    counter!("lookout_relay_rate_limited_total").increment(1);
}

/// Update the active relay session gauge.
pub fn set_active_sessions(count: f64) {
    gauge!("lookout_relay_sessions_active").set(count);
}

/// Record one pipeline connection opening.
pub fn pipeline_connection_opened() {
    gauge!("lookout_relay_pipeline_connections").increment(1.0);
}

/// Record one pipeline connection closing.
pub fn pipeline_connection_closed() {
    gauge!("lookout_relay_pipeline_connections").decrement(1.0);
}

// =============================================================================
// Tests
// =============================================================================
