//! Geofence endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_geofence_count;
use domain::models::geofence::{
    CheckPointRequest, CheckPointResponse, CreateGeofenceRequest, GeofenceResponse,
    ListGeofencesQuery, ListGeofencesResponse, UpdateGeofenceRequest,
};
use domain::models::Coordinate;

/// Create a new geofence.
///
/// POST /api/v1/geofences
pub async fn create_geofence(
    State(state): State<AppState>,
    Json(request): Json<CreateGeofenceRequest>,
) -> Result<(StatusCode, Json<GeofenceResponse>), ApiError> {
    request.validate()?;

    let geofence = state
        .engine
        .register_geofence(request.into_geofence(Utc::now()))?;
    record_geofence_count(state.engine.geofence_count());

    info!(
        geofence_id = %geofence.id,
        name = %geofence.name,
        shape = geofence.shape.kind(),
        parent_id = ?geofence.parent_id,
        "Geofence created"
    );

    Ok((StatusCode::CREATED, Json(geofence.into())))
}

/// List geofences.
///
/// GET /api/v1/geofences?includeInactive=<bool>
pub async fn list_geofences(
    State(state): State<AppState>,
    Query(query): Query<ListGeofencesQuery>,
) -> Json<ListGeofencesResponse> {
    let geofences: Vec<GeofenceResponse> = state
        .engine
        .list_geofences(query.include_inactive)
        .into_iter()
        .map(Into::into)
        .collect();
    let total = geofences.len();

    Json(ListGeofencesResponse { geofences, total })
}

/// Get a single geofence.
///
/// GET /api/v1/geofences/:geofence_id
pub async fn get_geofence(
    State(state): State<AppState>,
    Path(geofence_id): Path<Uuid>,
) -> Result<Json<GeofenceResponse>, ApiError> {
    let geofence = state
        .engine
        .geofence(geofence_id)
        .ok_or_else(|| ApiError::NotFound(format!("Geofence not found: {}", geofence_id)))?;
    Ok(Json(geofence.into()))
}

/// Partially update a geofence. Takes effect for the next evaluated update.
///
/// PUT /api/v1/geofences/:geofence_id
pub async fn update_geofence(
    State(state): State<AppState>,
    Path(geofence_id): Path<Uuid>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> Result<Json<GeofenceResponse>, ApiError> {
    request.validate()?;

    let geofence = state
        .engine
        .update_geofence(geofence_id, request, Utc::now())?;

    info!(
        geofence_id = %geofence.id,
        active = geofence.active,
        "Geofence updated"
    );

    Ok(Json(geofence.into()))
}

/// Delete a geofence.
///
/// DELETE /api/v1/geofences/:geofence_id
pub async fn delete_geofence(
    State(state): State<AppState>,
    Path(geofence_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let removed = state.engine.remove_geofence(geofence_id)?;
    record_geofence_count(state.engine.geofence_count());

    info!(geofence_id = %removed.id, name = %removed.name, "Geofence deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Stateless containment check: which zones contain a point, innermost first.
///
/// POST /api/v1/geofences/check
pub async fn check_point(
    State(state): State<AppState>,
    Json(request): Json<CheckPointRequest>,
) -> Result<Json<CheckPointResponse>, ApiError> {
    request.validate()?;

    let inside = state
        .engine
        .check_point(Coordinate::new(request.latitude, request.longitude))?;

    Ok(Json(CheckPointResponse {
        latitude: request.latitude,
        longitude: request.longitude,
        inside,
    }))
}
