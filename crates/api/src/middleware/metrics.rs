//! Prometheus metrics middleware.
//!
//! Provides HTTP request/response metrics collection and export, plus the
//! business counters recorded by the location and alert paths.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use domain::models::{ChannelKind, TransitionKind};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Middleware to record HTTP request metrics.
///
/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

/// Convert HTTP method to string for metric labels.
fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// Outcome label for a processed location update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Accepted,
    Replay,
    Stale,
    Invalid,
}

impl UpdateOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::Accepted => "accepted",
            UpdateOutcome::Replay => "replay",
            UpdateOutcome::Stale => "stale",
            UpdateOutcome::Invalid => "invalid",
        }
    }
}

/// Count a processed location update.
pub fn record_location_update(outcome: UpdateOutcome) {
    counter!("location_updates_total", "outcome" => outcome.as_str()).increment(1);
}

/// Count an emitted zone transition.
pub fn record_alert(transition: TransitionKind) {
    counter!("geofence_alerts_total", "transition" => transition.as_str()).increment(1);
}

/// Count a target that exhausted its delivery attempts.
pub fn record_delivery_failure(channel: ChannelKind) {
    counter!("alert_delivery_failures_total", "channel" => channel.as_str()).increment(1);
}

/// Current number of registered geofences.
pub fn record_geofence_count(count: usize) {
    gauge!("geofences_registered").set(count as f64);
}

/// Records tracked device and in-flight delivery gauges.
pub fn record_engine_stats(devices: usize, deliveries_in_flight: usize) {
    gauge!("devices_tracked").set(devices as f64);
    gauge!("alert_deliveries_in_flight").set(deliveries_in_flight as f64);
}

/// Handler for /metrics endpoint that returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            [(axum::http::header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        )
    }
}

/// Initialize the Prometheus metrics recorder.
///
/// Must be called during startup before any metrics are recorded. A second
/// call is a no-op.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    // A concurrent initializer may have won; its handle renders the same registry.
    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}
