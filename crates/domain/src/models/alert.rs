//! Alert event domain model.
//!
//! Alerts are produced by the evaluation engine when a device's membership in
//! a zone is confirmed (entry) or ends (exit).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geofence::Coordinate;

/// Zone transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Entered,
    Exited,
}

impl TransitionKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entered => "entered",
            Self::Exited => "exited",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "entered" => Some(Self::Entered),
            "exited" => Some(Self::Exited),
            _ => None,
        }
    }

    /// Convert to webhook event type string.
    pub fn to_webhook_event_type(&self) -> &'static str {
        match self {
            Self::Entered => "geofence_enter",
            Self::Exited => "geofence_exit",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A confirmed zone transition for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub event_id: Uuid,
    pub geofence_id: Uuid,
    pub device_id: Uuid,
    pub transition: TransitionKind,
    pub timestamp: DateTime<Utc>,
    pub location: Coordinate,
}

impl AlertEvent {
    pub fn new(
        geofence_id: Uuid,
        device_id: Uuid,
        transition: TransitionKind,
        timestamp: DateTime<Utc>,
        location: Coordinate,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            geofence_id,
            device_id,
            transition,
            timestamp,
            location,
        }
    }

    /// Key identifying re-deliveries of the same transition.
    ///
    /// Two events share a key when they concern the same device, zone and
    /// transition kind and their timestamps fall in the same bucket.
    pub fn dedup_key(&self, bucket: chrono::Duration) -> DedupKey {
        let bucket_millis = bucket.num_milliseconds().max(1);
        DedupKey {
            device_id: self.device_id,
            geofence_id: self.geofence_id,
            transition: self.transition,
            bucket: self.timestamp.timestamp_millis().div_euclid(bucket_millis),
        }
    }
}

/// Deduplication key for alert events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub device_id: Uuid,
    pub geofence_id: Uuid,
    pub transition: TransitionKind,
    pub bucket: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_at(seconds: i64) -> AlertEvent {
        AlertEvent::new(
            Uuid::nil(),
            Uuid::nil(),
            TransitionKind::Entered,
            Utc.timestamp_opt(seconds, 0).unwrap(),
            Coordinate::new(0.0, 0.0),
        )
    }

    #[test]
    fn test_transition_kind_as_str() {
        assert_eq!(TransitionKind::Entered.as_str(), "entered");
        assert_eq!(TransitionKind::Exited.as_str(), "exited");
    }

    #[test]
    fn test_transition_kind_parse() {
        assert_eq!(TransitionKind::parse("ENTERED"), Some(TransitionKind::Entered));
        assert_eq!(TransitionKind::parse("exited"), Some(TransitionKind::Exited));
        assert_eq!(TransitionKind::parse("dwell"), None);
    }

    #[test]
    fn test_transition_kind_to_webhook_event_type() {
        assert_eq!(TransitionKind::Entered.to_webhook_event_type(), "geofence_enter");
        assert_eq!(TransitionKind::Exited.to_webhook_event_type(), "geofence_exit");
    }

    #[test]
    fn test_dedup_key_same_bucket() {
        let minute = chrono::Duration::minutes(1);
        let a = event_at(1_700_000_040);
        let b = event_at(1_700_000_059);
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.dedup_key(minute), b.dedup_key(minute));
    }

    #[test]
    fn test_dedup_key_differs_across_buckets_and_kinds() {
        let minute = chrono::Duration::minutes(1);
        let a = event_at(1_700_000_040);
        let b = event_at(1_700_000_100);
        assert_ne!(a.dedup_key(minute), b.dedup_key(minute));

        let mut exit = a.clone();
        exit.transition = TransitionKind::Exited;
        assert_ne!(a.dedup_key(minute), exit.dedup_key(minute));
    }

    #[test]
    fn test_alert_event_serialization() {
        let json = serde_json::to_string(&event_at(0)).unwrap();
        assert!(json.contains("\"transition\":\"entered\""));
        assert!(json.contains("\"geofenceId\""));
    }
}
