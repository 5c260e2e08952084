//! Prometheus Metrics Module
//!
//! Exposes data client metrics in Prometheus format.
//!
//! # Metrics
//!
//! - **Requests**: historical request outcomes and round-trip latency
//! - **Messages**: published messages received and dropped per channel
//! - **Subscriptions**: active wire topics per channel
//! - **Reconnects**: socket connection retries
//!
//! Recording functions are no-ops until a recorder is installed, so library
//! users and tests need not call [`init_metrics`].

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::RequestOutcome;
use crate::domain::subscription::ChannelKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, once.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
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
    describe_counter!(
        "market_data_requests_total",
        "Historical data requests by data type and outcome"
    );
    describe_histogram!(
        "market_data_request_seconds",
        "Request/reply round-trip time"
    );
    describe_counter!(
        "market_data_messages_received_total",
        "Published messages received by channel"
    );
    describe_counter!(
        "market_data_messages_dropped_total",
        "Messages dropped by channel and reason"
    );
    describe_gauge!(
        "market_data_subscriptions",
        "Active wire subscriptions by channel"
    );
    describe_counter!(
        "market_data_reconnects_total",
        "Socket connection retries by endpoint"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a message was dropped.
#[derive(Debug, Clone, Copy)]
pub enum DropReason {
    /// No handler was registered for the topic.
    NoHandlers,
    /// The topic did not parse.
    BadTopic,
    /// The payload did not decode.
    BadPayload,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NoHandlers => "no_handlers",
            Self::BadTopic => "bad_topic",
            Self::BadPayload => "bad_payload",
        }
    }
}

/// Label for a request outcome.
const fn outcome_label(outcome: Option<&RequestOutcome>) -> &'static str {
    match outcome {
        Some(RequestOutcome::Delivered { .. }) => "delivered",
        Some(RequestOutcome::Rejected { .. }) => "rejected",
        Some(RequestOutcome::QueryFailed { .. }) => "query_failed",
        None => "error",
    }
}

/// Record a finished request. `None` means it ended in an error.
pub fn record_request(data_type: &'static str, outcome: Option<&RequestOutcome>) {
    counter!(
        "market_data_requests_total",
        "data_type" => data_type,
        "outcome" => outcome_label(outcome)
    )
    .increment(1);
}

/// Record a request/reply round trip.
pub fn record_request_duration(data_type: &'static str, duration: Duration) {
    histogram!(
        "market_data_request_seconds",
        "data_type" => data_type
    )
    .record(duration.as_secs_f64());
}

/// Record a published message received.
pub fn record_message_received(channel: ChannelKind) {
    counter!(
        "market_data_messages_received_total",
        "channel" => channel.as_str()
    )
    .increment(1);
}

/// Record a message dropped before reaching any handler.
pub fn record_message_dropped(channel: ChannelKind, reason: DropReason) {
    counter!(
        "market_data_messages_dropped_total",
        "channel" => channel.as_str(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Adjust the active subscription gauge.
pub fn adjust_subscriptions(channel: ChannelKind, delta: f64) {
    gauge!(
        "market_data_subscriptions",
        "channel" => channel.as_str()
    )
    .increment(delta);
}

/// Reset the active subscription gauges.
pub fn clear_subscriptions() {
    for channel in ChannelKind::all() {
        gauge!(
            "market_data_subscriptions",
            "channel" => channel.as_str()
        )
        .set(0.0);
    }
}

/// Record a socket connection retry.
pub fn record_reconnect(endpoint: &str) {
    counter!(
        "market_data_reconnects_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_reason_labels() {
        assert_eq!(DropReason::NoHandlers.as_str(), "no_handlers");
        assert_eq!(DropReason::BadTopic.as_str(), "bad_topic");
        assert_eq!(DropReason::BadPayload.as_str(), "bad_payload");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(
            outcome_label(Some(&RequestOutcome::Delivered { count: 3 })),
            "delivered"
        );
        assert_eq!(
            outcome_label(Some(&RequestOutcome::Rejected {
                reason: String::new()
            })),
            "rejected"
        );
        assert_eq!(outcome_label(None), "error");
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        record_message_received(ChannelKind::Ticks);
        record_message_dropped(ChannelKind::Bars, DropReason::NoHandlers);
        adjust_subscriptions(ChannelKind::Instruments, 1.0);
        record_request("tick", None);
    }
}
