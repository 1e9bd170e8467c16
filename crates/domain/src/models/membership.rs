//! Zone membership domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Containment state of a device with respect to one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Outside,
    Entering,
    Inside,
    Exiting,
}

impl MembershipState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outside => "outside",
            Self::Entering => "entering",
            Self::Inside => "inside",
            Self::Exiting => "exiting",
        }
    }
}

impl std::fmt::Display for MembershipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership record for a (device, zone) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMembership {
    pub device_id: Uuid,
    pub geofence_id: Uuid,
    pub state: MembershipState,
    /// When the current stay started (first inside observation).
    pub entered_at: Option<DateTime<Utc>>,
    /// When the device was first observed outside after being inside.
    pub exited_at: Option<DateTime<Utc>>,
    /// Dwell threshold applied while inside; a gated exit reuses it.
    pub dwell_seconds: i64,
    pub updated_at: DateTime<Utc>,
}

impl ZoneMembership {
    pub fn new(device_id: Uuid, geofence_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            geofence_id,
            state: MembershipState::Outside,
            entered_at: None,
            exited_at: None,
            dwell_seconds: 0,
            updated_at: now,
        }
    }

    /// Anything but `Outside` counts as a live membership.
    pub fn is_active(&self) -> bool {
        self.state != MembershipState::Outside
    }

    pub fn dwell(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dwell_seconds)
    }
}

/// Response for listing a device's memberships.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembershipsResponse {
    pub device_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    pub memberships: Vec<ZoneMembership>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_state_serialization() {
        let json = serde_json::to_string(&MembershipState::Entering).unwrap();
        assert_eq!(json, "\"entering\"");
        assert_eq!(MembershipState::Exiting.to_string(), "exiting");
    }

    #[test]
    fn test_new_membership_is_outside() {
        let m = ZoneMembership::new(Uuid::nil(), Uuid::nil(), Utc::now());
        assert_eq!(m.state, MembershipState::Outside);
        assert!(!m.is_active());
    }
}
