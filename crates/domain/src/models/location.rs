//! Location update domain model.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::alert::AlertEvent;
use super::geofence::{validation_message, Coordinate};

/// A single position fix reported by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub device_id: Uuid,
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
    /// Ground speed in meters per second.
    pub speed: Option<f64>,
    /// Heading in degrees clockwise from north.
    pub heading: Option<f64>,
}

impl LocationUpdate {
    pub fn new(device_id: Uuid, coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            coordinate,
            timestamp,
            speed: None,
            heading: None,
        }
    }

    /// Rejects malformed coordinates and out-of-range speed/heading.
    pub fn check(&self) -> Result<(), String> {
        self.coordinate.check()?;
        if let Some(speed) = self.speed {
            shared::validation::validate_speed(speed).map_err(validation_message)?;
        }
        if let Some(heading) = self.heading {
            shared::validation::validate_bearing(heading).map_err(validation_message)?;
        }
        Ok(())
    }

    /// True when `other` carries the same fix (same timestamp and position).
    pub fn is_replay_of(&self, timestamp: DateTime<Utc>, coordinate: Coordinate) -> bool {
        self.timestamp == timestamp && self.coordinate == coordinate
    }
}

/// Request payload for single location upload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadLocationRequest {
    pub device_id: Uuid,

    /// Timestamp in milliseconds since epoch
    #[validate(custom(function = "shared::validation::validate_timestamp"))]
    pub timestamp: i64,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_bearing"))]
    pub heading: Option<f64>,
}

impl UploadLocationRequest {
    /// Converts the wire representation into a domain update.
    pub fn into_update(self) -> Result<LocationUpdate, String> {
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp)
            .single()
            .ok_or_else(|| "Invalid timestamp".to_string())?;

        Ok(LocationUpdate {
            device_id: self.device_id,
            coordinate: Coordinate::new(self.latitude, self.longitude),
            timestamp,
            speed: self.speed,
            heading: self.heading,
        })
    }
}

/// Response for a single evaluated location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLocationResponse {
    pub accepted: bool,
    pub alerts: Vec<AlertEvent>,
}

/// Request payload for batch location upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadRequest {
    pub locations: Vec<UploadLocationRequest>,
}

/// Outcome of a single item in a batch upload, in submission order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub index: usize,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub alerts: Vec<AlertEvent>,
}

/// Response for a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadResponse {
    pub processed: usize,
    pub accepted: usize,
    pub results: Vec<BatchItemResult>,
}
