//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::ChannelKind;
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: EngineHealth,
    pub channels: ChannelHealth,
}

/// Evaluation engine state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineHealth {
    pub geofences: usize,
    pub devices: usize,
    pub deliveries_in_flight: usize,
}

/// Which notification channels are attached to the dispatcher.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelHealth {
    pub webhook: bool,
    pub email: bool,
    pub sms: bool,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.is_shutting_down() {
        "draining"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: EngineHealth {
            geofences: state.engine.geofence_count(),
            devices: state.engine.device_count(),
            deliveries_in_flight: state.dispatcher.in_flight(),
        },
        channels: ChannelHealth {
            webhook: state.dispatcher.has_channel(ChannelKind::Webhook),
            email: state.dispatcher.has_channel(ChannelKind::Email),
            sms: state.dispatcher.has_channel(ChannelKind::Sms),
        },
    })
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Fails with 503 once shutdown has begun so load balancers stop routing
/// new updates here while in-flight deliveries drain.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    if state.is_shutting_down() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(StatusResponse {
        status: "ready".to_string(),
    }))
}
