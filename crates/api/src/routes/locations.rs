//! Location endpoint handlers.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::{record_alert, record_location_update, UpdateOutcome};
use domain::models::location::{
    BatchItemResult, BatchUploadRequest, BatchUploadResponse, UploadLocationRequest,
    UploadLocationResponse,
};
use domain::models::{AlertEvent, LocationUpdate};
use domain::services::DispatchOutcome;
use domain::GeofenceError;

/// Archived dates response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDatesResponse {
    pub dates: Vec<NaiveDate>,
}

/// Evaluate one update, then hand its alerts to the dispatcher and archive it.
/// Replayed updates are acknowledged without being archived again.
async fn apply_update(
    state: &AppState,
    update: LocationUpdate,
) -> Result<Vec<AlertEvent>, GeofenceError> {
    let alerts = match state.engine.process(&update) {
        Ok(evaluation) if evaluation.replay => {
            record_location_update(UpdateOutcome::Replay);
            return Ok(evaluation.alerts);
        }
        Ok(evaluation) => evaluation.alerts,
        Err(err) => {
            let outcome = match err {
                GeofenceError::StaleUpdate { .. } => UpdateOutcome::Stale,
                _ => UpdateOutcome::Invalid,
            };
            record_location_update(outcome);
            warn!(device_id = %update.device_id, error = %err, "Location update rejected");
            return Err(err);
        }
    };
    record_location_update(UpdateOutcome::Accepted);

    for event in &alerts {
        record_alert(event.transition);
        // zone may have been removed since evaluation
        let Some(geofence) = state.engine.geofence(event.geofence_id) else {
            continue;
        };
        match state.dispatcher.dispatch(event.clone(), &geofence) {
            DispatchOutcome::Queued(targets) => debug!(
                event_id = %event.event_id,
                targets = targets,
                "Alert queued for delivery"
            ),
            DispatchOutcome::Duplicate => debug!(
                event_id = %event.event_id,
                "Duplicate alert suppressed"
            ),
            DispatchOutcome::NoTargets => {}
        }
    }

    if let Some(archive) = &state.archive {
        if let Err(e) = archive.store(&update).await {
            warn!(device_id = %update.device_id, error = %e, "Failed to archive location");
        }
    }

    Ok(alerts)
}

/// Upload and evaluate a single location.
///
/// POST /api/v1/locations
pub async fn upload_location(
    State(state): State<AppState>,
    Json(request): Json<UploadLocationRequest>,
) -> Result<Json<UploadLocationResponse>, ApiError> {
    if let Err(e) = request.validate() {
        record_location_update(UpdateOutcome::Invalid);
        return Err(e.into());
    }
    let update = request.into_update().map_err(|msg| {
        record_location_update(UpdateOutcome::Invalid);
        ApiError::Validation(msg)
    })?;
    let device_id = update.device_id;

    let alerts = apply_update(&state, update).await?;

    info!(
        device_id = %device_id,
        alerts = alerts.len(),
        "Location evaluated"
    );

    Ok(Json(UploadLocationResponse {
        accepted: true,
        alerts,
    }))
}

/// Upload multiple locations in a batch.
///
/// Items are applied in timestamp order; results are reported in submission
/// order and one bad item does not fail the rest.
///
/// POST /api/v1/locations/batch
pub async fn upload_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchUploadRequest>,
) -> Result<Json<BatchUploadResponse>, ApiError> {
    let max_batch_size = state.config.limits.max_batch_size;
    if request.locations.is_empty() {
        return Err(ApiError::Validation(
            "At least one location is required".to_string(),
        ));
    }
    if request.locations.len() > max_batch_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "Batch exceeds maximum of {} locations",
            max_batch_size
        )));
    }

    let mut results: Vec<BatchItemResult> = Vec::with_capacity(request.locations.len());
    let mut pending: Vec<(usize, LocationUpdate)> = Vec::with_capacity(request.locations.len());

    for (index, location) in request.locations.into_iter().enumerate() {
        let parsed = location
            .validate()
            .map_err(|e| ApiError::from(e).to_string())
            .and_then(|()| location.into_update());
        match parsed {
            Ok(update) => pending.push((index, update)),
            Err(error) => {
                record_location_update(UpdateOutcome::Invalid);
                results.push(BatchItemResult {
                    index,
                    accepted: false,
                    error: Some(error),
                    alerts: Vec::new(),
                });
            }
        }
    }

    // stable: equal timestamps keep submission order
    pending.sort_by_key(|(_, update)| update.timestamp);

    for (index, update) in pending {
        let result = match apply_update(&state, update).await {
            Ok(alerts) => BatchItemResult {
                index,
                accepted: true,
                error: None,
                alerts,
            },
            Err(err) => BatchItemResult {
                index,
                accepted: false,
                error: Some(err.to_string()),
                alerts: Vec::new(),
            },
        };
        results.push(result);
    }

    results.sort_by_key(|r| r.index);
    let accepted = results.iter().filter(|r| r.accepted).count();

    info!(
        processed = results.len(),
        accepted = accepted,
        "Batch locations evaluated"
    );

    Ok(Json(BatchUploadResponse {
        processed: results.len(),
        accepted,
        results,
    }))
}

/// List days with archived locations.
///
/// GET /api/v1/locations/dates
pub async fn list_dates(State(state): State<AppState>) -> Result<Json<ListDatesResponse>, ApiError> {
    let dates = match &state.archive {
        Some(archive) => archive
            .list_dates()
            .await
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?,
        None => Vec::new(),
    };
    Ok(Json(ListDatesResponse { dates }))
}
