//! Prometheus Metrics Module
//!
//! Exposes ingestion metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Messages**: Messages received and rejected per category
//! - **Connection**: Broker connection state and reconnect attempts
//! - **Farm State**: Turbines tracked and alerts retained
//! - **Latency**: Time to apply a decoded message to the farm state
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::infrastructure::mqtt::MessageCategory;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Repeated calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
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
    // Message counters
    describe_counter!(
        "windfarm_messages_received_total",
        "Total messages received from the broker by category"
    );
    describe_counter!(
        "windfarm_decode_failures_total",
        "Total messages dropped because they could not be decoded"
    );

    // Connection
    describe_gauge!(
        "windfarm_broker_connected",
        "1 while a broker session is established"
    );
    describe_counter!(
        "windfarm_reconnect_attempts_total",
        "Total scheduled broker reconnection attempts"
    );

    // Farm state
    describe_gauge!(
        "windfarm_turbines_tracked",
        "Turbines currently held in the farm state"
    );
    describe_gauge!(
        "windfarm_alerts_retained",
        "Alerts currently retained in the farm state"
    );

    // Latency histograms
    describe_histogram!(
        "windfarm_message_apply_seconds",
        "Time to apply a decoded message to the farm state"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a message received from the broker.
pub fn record_message_received(category: MessageCategory) {
    counter!(
        "windfarm_messages_received_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record a message dropped by the decoder.
pub fn record_decode_failure(category: MessageCategory) {
    counter!(
        "windfarm_decode_failures_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Update the broker connection gauge.
pub fn set_broker_connected(connected: bool) {
    gauge!("windfarm_broker_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect_attempt() {
    counter!("windfarm_reconnect_attempts_total").increment(1);
}

/// Update the tracked turbine count.
#[allow(clippy::cast_precision_loss)]
pub fn set_turbines_tracked(count: usize) {
    gauge!("windfarm_turbines_tracked").set(count as f64);
}

/// Update the retained alert count.
#[allow(clippy::cast_precision_loss)]
pub fn set_alerts_retained(count: usize) {
    gauge!("windfarm_alerts_retained").set(count as f64);
}

/// Record how long applying a message took.
pub fn record_apply_duration(category: MessageCategory, duration: Duration) {
    histogram!(
        "windfarm_message_apply_seconds",
        "category" => category.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
