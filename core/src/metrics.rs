//! Operational metrics for ticket releases.
//!
//! Recorded through the `metrics` facade; the server binary installs the
//! Prometheus exporter. Without an installed recorder every call is a no-op,
//! which is what tests rely on.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `relief_desk_tickets_released_total{category}` - Tickets issued by releases
//! - `relief_desk_release_failures_total{reason}` - Per-item issue failures
//! - `relief_desk_configuration_errors_total{category}` - Malformed capacity rows
//! - `relief_desk_ticket_number_collisions_total` - Retried ticket number clashes (storage adapter)
//!
//! ## Gauges
//! - `relief_desk_queue_depth{category}` - Pending plus approved requests at last report
//! - `relief_desk_slot_overbooked{category}` - 1 when the last checked slot of a category was overbooked
//!
//! ## Histograms
//! - `relief_desk_release_duration_seconds` - Wall time of one release batch
//! - `relief_desk_http_request_duration_seconds{method,status}` - Admin API latency (web layer)

use crate::types::Category;
use ::metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;

/// Register all release metric descriptions.
///
/// Call once at startup, after installing the recorder.
pub fn register_release_metrics() {
    describe_counter!(
        "relief_desk_tickets_released_total",
        "Total number of tickets issued by release batches, by category"
    );
    describe_counter!(
        "relief_desk_release_failures_total",
        "Total number of requests a release could not ticket, by reason"
    );
    describe_counter!(
        "relief_desk_configuration_errors_total",
        "Capacity rows with invalid values, clamped to zero"
    );
    describe_counter!(
        "relief_desk_ticket_number_collisions_total",
        "Generated ticket numbers rejected by the unique constraint"
    );
    describe_gauge!(
        "relief_desk_queue_depth",
        "Pending plus approved requests for the most recently reported slot"
    );
    describe_gauge!(
        "relief_desk_slot_overbooked",
        "Whether the most recently checked slot of a category was overbooked (0 or 1)"
    );
    describe_histogram!(
        "relief_desk_release_duration_seconds",
        "Time taken to run one release batch"
    );
    describe_histogram!(
        "relief_desk_http_request_duration_seconds",
        "Admin API request latency"
    );

    tracing::info!("Release metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record tickets issued for one category in a batch.
pub fn record_tickets_released(category: Category, count: u32) {
    if count == 0 {
        return;
    }
    ::metrics::counter!("relief_desk_tickets_released_total", "category" => category.as_str())
        .increment(u64::from(count));
}

/// Record a per-item release failure.
///
/// # Arguments
///
/// * `reason` - Failure kind (e.g., `invalid_state`, `persistence`)
pub fn record_release_failure(reason: &'static str) {
    ::metrics::counter!("relief_desk_release_failures_total", "reason" => reason).increment(1);
}

/// Record the wall time of a release batch.
pub fn record_release_duration(duration: Duration) {
    ::metrics::histogram!("relief_desk_release_duration_seconds").record(duration.as_secs_f64());
}

/// Record a malformed capacity configuration value.
pub fn record_configuration_error(category: Category) {
    ::metrics::counter!(
        "relief_desk_configuration_errors_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Update the queue depth gauge for a category.
pub fn update_queue_depth(category: Category, depth: u32) {
    ::metrics::gauge!("relief_desk_queue_depth", "category" => category.as_str())
        .set(f64::from(depth));
}

/// Update the overbooking flag for a category.
pub fn update_overbooked(category: Category, overbooked: bool) {
    ::metrics::gauge!("relief_desk_slot_overbooked", "category" => category.as_str())
        .set(if overbooked { 1.0 } else { 0.0 });
}
