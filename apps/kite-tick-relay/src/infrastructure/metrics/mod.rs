//! Prometheus Metrics Module
//!
//! Exposes relay metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Feed**: Tick batches received, connection state, errors, reconnects
//! - **Fan-out**: Ticks published, failed subscriber deliveries
//! - **Subscribers**: Connected downstream clients
//! - **Catalog**: Subscription size, skipped catalog rows
//! - **Latency**: Batch enrichment and publish time
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the relay HTTP port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
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
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            #[allow(clippy::expect_used)]
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
        "kite_relay_tick_batches_received_total",
        "Total tick batches received from the Kite ticker"
    );
    describe_counter!(
        "kite_relay_ticks_received_total",
        "Total ticks received from the Kite ticker"
    );
    describe_counter!(
        "kite_relay_ticks_published_total",
        "Total enriched ticks handed to the sink"
    );
    describe_counter!(
        "kite_relay_deliveries_failed_total",
        "Total failed deliveries to individual subscribers"
    );

    describe_gauge!(
        "kite_relay_feed_connected",
        "1 when the Kite ticker connection is active"
    );
    describe_gauge!(
        "kite_relay_subscribers",
        "Number of connected downstream subscribers"
    );
    describe_gauge!(
        "kite_relay_subscription_size",
        "Number of instrument tokens subscribed upstream"
    );

    describe_counter!(
        "kite_relay_feed_errors_total",
        "Total errors reported by the Kite ticker connection"
    );
    describe_counter!(
        "kite_relay_reconnects_total",
        "Total automatic reconnection attempts"
    );
    describe_counter!(
        "kite_relay_catalog_rows_skipped_total",
        "Total malformed catalog rows skipped at startup"
    );

    describe_histogram!(
        "kite_relay_batch_processing_seconds",
        "Time to enrich and publish one tick batch"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a tick batch received from the feed.
pub fn record_batch_received(ticks: usize) {
    counter!("kite_relay_tick_batches_received_total").increment(1);
    counter!("kite_relay_ticks_received_total").increment(ticks as u64);
}

/// Record enriched ticks handed to a sink.
pub fn record_ticks_published(sink: &'static str, count: usize) {
    counter!("kite_relay_ticks_published_total", "sink" => sink).increment(count as u64);
}

/// Record a failed delivery to one subscriber.
pub fn record_delivery_failed(reason: &'static str) {
    counter!("kite_relay_deliveries_failed_total", "reason" => reason).increment(1);
}

/// Update the feed connection gauge.
pub fn set_feed_connected(connected: bool) {
    gauge!("kite_relay_feed_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Update the subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("kite_relay_subscribers").set(count as f64);
}

/// Update the subscription size.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscription_size(count: usize) {
    gauge!("kite_relay_subscription_size").set(count as f64);
}

/// Record a feed error.
pub fn record_feed_error() {
    counter!("kite_relay_feed_errors_total").increment(1);
}

/// Record an automatic reconnection attempt.
pub fn record_reconnect() {
    counter!("kite_relay_reconnects_total").increment(1);
}

/// Record skipped catalog rows.
pub fn record_catalog_rows_skipped(count: usize) {
    counter!("kite_relay_catalog_rows_skipped_total").increment(count as u64);
}

/// Record batch processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("kite_relay_batch_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
