//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Active WebSocket connection gauge
//! - Fan-out events by direction and local deliveries
//! - Durable store reconnects
//! - Backbone connectivity

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace("chat_gateway"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace("chat_gateway")
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("chat_gateway"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Fan-out events by direction ("published", "received", "ignored")
pub static FANOUT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_events_total", "Fan-out events seen on the backbone")
            .namespace("chat_gateway"),
        &["direction"],
    )
    .expect("Failed to create FANOUT_EVENTS_TOTAL metric")
});

/// Events handed to local connections
pub static FANOUT_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "fanout_deliveries_total",
            "Events delivered to locally connected sockets",
        )
        .namespace("chat_gateway"),
    )
    .expect("Failed to create FANOUT_DELIVERIES_TOTAL metric")
});

/// Reconnects performed by the store supervisor
pub static STORE_RECONNECTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "store_reconnects_total",
            "Successful durable store reconnects",
        )
        .namespace("chat_gateway"),
    )
    .expect("Failed to create STORE_RECONNECTS_TOTAL metric")
});

/// 1 while the pub/sub backbone is connected
pub static BACKBONE_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("backbone_connected", "Whether the pub/sub backbone is connected")
            .namespace("chat_gateway"),
    )
    .expect("Failed to create BACKBONE_CONNECTED metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(FANOUT_EVENTS_TOTAL.clone()))
        .expect("Failed to register FANOUT_EVENTS_TOTAL");
    registry
        .register(Box::new(FANOUT_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register FANOUT_DELIVERIES_TOTAL");
    registry
        .register(Box::new(STORE_RECONNECTS_TOTAL.clone()))
        .expect("Failed to register STORE_RECONNECTS_TOTAL");
    registry
        .register(Box::new(BACKBONE_CONNECTED.clone()))
        .expect("Failed to register BACKBONE_CONNECTED");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Set the active connection gauge
pub fn set_websocket_connections(active: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(active as i64);
}

/// Count a fan-out event ("published", "received" or "ignored")
pub fn record_fanout_event(direction: &str) {
    FANOUT_EVENTS_TOTAL.with_label_values(&[direction]).inc();
}

/// Count local deliveries
pub fn record_fanout_deliveries(count: usize) {
    FANOUT_DELIVERIES_TOTAL.inc_by(count as u64);
}

pub fn record_store_reconnect() {
    STORE_RECONNECTS_TOTAL.inc();
}

pub fn set_backbone_connected(connected: bool) {
    BACKBONE_CONNECTED.set(i64::from(connected));
}
