//! Domain error types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by zone registration and location evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeofenceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Geofence not found: {0}")]
    NotFound(Uuid),

    #[error("Geofence already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Parent {parent_id} would create a cycle for geofence {geofence_id}")]
    ParentCycle { geofence_id: Uuid, parent_id: Uuid },

    #[error("Invalid location update: {0}")]
    InvalidLocation(String),

    #[error("Stale update for device {device_id}: {timestamp} is older than {last_applied}")]
    StaleUpdate {
        device_id: Uuid,
        timestamp: DateTime<Utc>,
        last_applied: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        assert_eq!(
            GeofenceError::Validation("bad ring".to_string()).to_string(),
            "Validation error: bad ring"
        );
        assert_eq!(
            GeofenceError::NotFound(id).to_string(),
            format!("Geofence not found: {}", id)
        );
        assert!(GeofenceError::ParentCycle {
            geofence_id: id,
            parent_id: id
        }
        .to_string()
        .contains("cycle"));
    }
}
