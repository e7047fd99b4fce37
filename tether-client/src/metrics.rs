//! Client metrics definitions
//!
//! OpenTelemetry instruments recorded by the client and its transports. They are
//! only created when observability is enabled on the builder; otherwise nothing
//! is recorded.
//!
//! # Metrics Collected
//!
//! - **tether.client.calls.total**: completed calls by method and status (counter)
//! - **tether.client.call.duration**: call latency in seconds, retries included (histogram)
//! - **tether.client.call.attempts**: attempts made per call (histogram)
//! - **tether.client.retries.total**: retries by method (counter)
//! - **tether.client.timeouts.total**: attempts that hit the deadline (counter)
//! - **tether.client.errors.total**: surfaced errors by code (counter)
//! - **tether.client.connection.state**: socket connection state (gauge)
//! - **tether.client.reconnections.total**: on-demand socket reconnects (counter)
//! - **tether.client.notifications.received**: pushed notifications by method (counter)

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    InstrumentationScope, KeyValue,
};
use tether_core::Error;

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Completed calls
    pub calls_total: Counter<u64>,
    /// Call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Attempts per call
    pub call_attempts: Histogram<u64>,
    /// Retries performed
    pub retries_total: Counter<u64>,
    /// Attempts that timed out
    pub timeouts_total: Counter<u64>,
    /// Errors surfaced to callers
    pub errors_total: Counter<u64>,
    /// Socket connection state (0=disconnected, 1=connecting, 2=connected, 3=closed)
    pub connection_state: Gauge<i64>,
    /// Socket reconnects
    pub reconnections_total: Counter<u64>,
    /// Notifications pushed by the peer
    pub notifications_received: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider, scoped to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let meter = global::meter_with_scope(scope);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            calls_total: meter
                .u64_counter("tether.client.calls.total")
                .with_description("Total number of completed calls")
                .build(),
            call_duration: meter
                .f64_histogram("tether.client.call.duration")
                .with_description("Call duration in seconds, including retries")
                .with_unit("s")
                .build(),
            call_attempts: meter
                .u64_histogram("tether.client.call.attempts")
                .with_description("Number of attempts made per call")
                .build(),
            retries_total: meter
                .u64_counter("tether.client.retries.total")
                .with_description("Total number of retried attempts")
                .build(),
            timeouts_total: meter
                .u64_counter("tether.client.timeouts.total")
                .with_description("Total number of attempts that hit the deadline")
                .build(),
            errors_total: meter
                .u64_counter("tether.client.errors.total")
                .with_description("Total number of errors surfaced to callers")
                .build(),
            connection_state: meter
                .i64_gauge("tether.client.connection.state")
                .with_description("Socket state (0=disconnected, 1=connecting, 2=connected, 3=closed)")
                .build(),
            reconnections_total: meter
                .u64_counter("tether.client.reconnections.total")
                .with_description("Total number of on-demand socket reconnects")
                .build(),
            notifications_received: meter
                .u64_counter("tether.client.notifications.received")
                .with_description("Total number of notifications received")
                .build(),
        }
    }

    /// Record a finished call
    pub fn record_call(&self, method: &str, status: &str, duration_secs: f64, attempts: u64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
        self.call_attempts
            .record(attempts, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record one retry of `method`
    pub fn record_retry(&self, method: &str) {
        self.retries_total
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record an attempt of `method` that hit the deadline
    pub fn record_timeout(&self, method: &str) {
        self.timeouts_total
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record an error surfaced to the caller
    pub fn record_error(&self, error: &Error) {
        self.errors_total
            .add(1, &[KeyValue::new("code", error_label(error))]);
    }

    /// Update the socket connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_metric(), &[]);
    }

    /// Record an on-demand reconnect
    pub fn record_reconnect(&self) {
        self.reconnections_total.add(1, &[]);
    }

    /// Record a notification pushed by the peer
    pub fn record_notification(&self, method: &str) {
        self.notifications_received
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }
}

/// Low-cardinality label for an error: the numeric code, or the error kind
pub fn error_label(error: &Error) -> String {
    match error {
        Error::Rpc(data) => data.code.to_string(),
        Error::Timeout { .. } => "timeout".to_string(),
        Error::ConnectionClosed => "connection_closed".to_string(),
        Error::Configuration(_) => "configuration".to_string(),
    }
}
