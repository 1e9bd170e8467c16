//! Device state endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::membership::ListMembershipsResponse;
use domain::models::{Device, LocationUpdate};

/// Query parameters for archived location lookups.
#[derive(Debug, Deserialize)]
pub struct LocationsQuery {
    pub date: NaiveDate,
}

/// A device's archived locations for one day.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLocationsResponse {
    pub device_id: Uuid,
    pub date: NaiveDate,
    pub locations: Vec<LocationUpdate>,
}

/// Last known state of a device.
///
/// GET /api/v1/devices/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<Device>, ApiError> {
    state
        .engine
        .device(device_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Device not found: {}", device_id)))
}

/// Zone memberships tracked for a device. Unknown devices have none.
///
/// GET /api/v1/devices/:device_id/memberships
pub async fn get_memberships(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
) -> Json<ListMembershipsResponse> {
    let last_update = state
        .engine
        .device(device_id)
        .and_then(|device| device.last_update);

    Json(ListMembershipsResponse {
        device_id,
        last_update,
        memberships: state.engine.memberships(device_id),
    })
}

/// Archived locations for a device on one UTC day.
///
/// GET /api/v1/devices/:device_id/locations?date=YYYY-MM-DD
pub async fn get_locations(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    Query(query): Query<LocationsQuery>,
) -> Result<Json<DeviceLocationsResponse>, ApiError> {
    let archive = state
        .archive
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Location archive is disabled".to_string()))?;

    let locations = archive
        .list_for_device(device_id, query.date)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

    Ok(Json(DeviceLocationsResponse {
        device_id,
        date: query.date,
        locations,
    }))
}
