//! Common validation utilities.

use chrono::{TimeZone, Utc};
use validator::ValidationError;

/// Maximum allowed future timestamp tolerance in seconds (5 minutes for clock skew).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 300;

/// Smallest circle radius accepted for a geofence, in meters.
pub const MIN_RADIUS_METERS: f64 = 50.0;

/// Largest circle radius accepted for a geofence, in meters.
pub const MAX_RADIUS_METERS: f64 = 50_000.0;

/// Longest dwell threshold accepted for a geofence (24 hours).
pub const MAX_DWELL_SECONDS: u32 = 86_400;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that bearing is within valid range (0 to 360).
pub fn validate_bearing(bearing: f64) -> Result<(), ValidationError> {
    if (0.0..=360.0).contains(&bearing) {
        Ok(())
    } else {
        let mut err = ValidationError::new("bearing_range");
        err.message = Some("Bearing must be between 0 and 360".into());
        Err(err)
    }
}

/// Validates that speed is non-negative.
pub fn validate_speed(speed: f64) -> Result<(), ValidationError> {
    if speed >= 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("speed_range");
        err.message = Some("Speed must be non-negative".into());
        Err(err)
    }
}

/// Validates a circle radius against the supported geofence range.
pub fn validate_radius_meters(radius: f64) -> Result<(), ValidationError> {
    if (MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius) {
        Ok(())
    } else {
        let mut err = ValidationError::new("radius_range");
        err.message = Some("Radius must be between 50 and 50000 meters".into());
        Err(err)
    }
}

/// Validates a dwell threshold in seconds (0 to 24 hours).
pub fn validate_dwell_seconds(dwell: u32) -> Result<(), ValidationError> {
    if dwell <= MAX_DWELL_SECONDS {
        Ok(())
    } else {
        let mut err = ValidationError::new("dwell_range");
        err.message = Some("Dwell threshold must be between 0 and 86400 seconds".into());
        Err(err)
    }
}

/// Validates that a timestamp (in milliseconds since epoch) is usable for evaluation.
/// - Must be positive and representable
/// - Must not be more than 5 minutes in the future (allows for clock skew)
///
/// Old timestamps are accepted: devices flush buffered fixes after reconnecting,
/// and ordering is enforced per device by the engine instead.
pub fn validate_timestamp(timestamp_millis: i64) -> Result<(), ValidationError> {
    if timestamp_millis <= 0 {
        let mut err = ValidationError::new("timestamp_invalid");
        err.message = Some("Timestamp must be positive".into());
        return Err(err);
    }

    let timestamp = match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(ts) => ts,
        None => {
            let mut err = ValidationError::new("timestamp_invalid");
            err.message = Some("Invalid timestamp format".into());
            return Err(err);
        }
    };

    let future_limit = Utc::now() + chrono::Duration::seconds(MAX_FUTURE_TOLERANCE_SECS);
    if timestamp > future_limit {
        let mut err = ValidationError::new("timestamp_future");
        err.message = Some("Timestamp cannot be in the future".into());
        return Err(err);
    }

    Ok(())
}
