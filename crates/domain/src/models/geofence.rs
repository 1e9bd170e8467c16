//! Geofence domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::notification::NotificationTarget;

/// Maximum number of vertices accepted in a polygon ring.
pub const MAX_POLYGON_VERTICES: usize = 100;

/// Maximum number of notification targets per geofence.
pub const MAX_NOTIFICATION_TARGETS: usize = 10;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Checks both components against their valid ranges.
    ///
    /// NaN and infinite values fail the range checks as well.
    pub fn check(&self) -> Result<(), String> {
        shared::validation::validate_latitude(self.latitude).map_err(validation_message)?;
        shared::validation::validate_longitude(self.longitude).map_err(validation_message)?;
        Ok(())
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Extracts the human readable message from a validator error.
pub(crate) fn validation_message(err: ValidationError) -> String {
    err.message
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string())
}

/// Geometry of a geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GeofenceShape {
    Circle {
        center: Coordinate,
        radius_meters: f64,
    },
    Polygon {
        vertices: Vec<Coordinate>,
    },
}

impl GeofenceShape {
    /// Returns the shape type name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GeofenceShape::Circle { .. } => "circle",
            GeofenceShape::Polygon { .. } => "polygon",
        }
    }
}

/// Represents a geofence registered with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub shape: GeofenceShape,
    /// Enclosing zone. A weak reference: the parent may be missing.
    pub parent_id: Option<Uuid>,
    pub dwell_seconds: u32,
    pub active: bool,
    pub notifications: Vec<NotificationTarget>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    /// Minimum time a device must stay inside before an entry alert fires.
    pub fn dwell_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.dwell_seconds))
    }
}

/// Default active status for new geofences.
fn default_active() -> bool {
    true
}

/// Request payload for creating a geofence.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    /// Optional caller supplied id, used when syncing zones from another system.
    pub id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub shape: GeofenceShape,

    pub parent_id: Option<Uuid>,

    #[serde(default)]
    #[validate(range(max = 86400, message = "Dwell threshold must be between 0 and 86400 seconds"))]
    pub dwell_seconds: u32,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 notification targets are allowed"))]
    pub notifications: Vec<NotificationTarget>,

    pub metadata: Option<serde_json::Value>,
}

impl CreateGeofenceRequest {
    /// Builds the geofence record. Geometry is checked by the registry.
    pub fn into_geofence(self, now: DateTime<Utc>) -> Geofence {
        Geofence {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name: self.name,
            shape: self.shape,
            parent_id: self.parent_id,
            dwell_seconds: self.dwell_seconds,
            active: self.active,
            notifications: self.notifications,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for updating a geofence (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub shape: Option<GeofenceShape>,

    pub parent_id: Option<Uuid>,

    /// Detach the geofence from its parent. Ignored when `parentId` is set.
    #[serde(default)]
    pub clear_parent: bool,

    #[validate(range(max = 86400, message = "Dwell threshold must be between 0 and 86400 seconds"))]
    pub dwell_seconds: Option<u32>,

    pub active: Option<bool>,

    #[validate(length(max = 10, message = "At most 10 notification targets are allowed"))]
    pub notifications: Option<Vec<NotificationTarget>>,

    pub metadata: Option<serde_json::Value>,
}

impl UpdateGeofenceRequest {
    /// Returns a copy of `current` with the requested changes applied.
    pub fn apply(self, current: &Geofence, now: DateTime<Utc>) -> Geofence {
        let mut updated = current.clone();
        if let Some(name) = self.name {
            updated.name = name;
        }
        if let Some(shape) = self.shape {
            updated.shape = shape;
        }
        if self.parent_id.is_some() {
            updated.parent_id = self.parent_id;
        } else if self.clear_parent {
            updated.parent_id = None;
        }
        if let Some(dwell) = self.dwell_seconds {
            updated.dwell_seconds = dwell;
        }
        if let Some(active) = self.active {
            updated.active = active;
        }
        if let Some(notifications) = self.notifications {
            updated.notifications = notifications;
        }
        if self.metadata.is_some() {
            updated.metadata = self.metadata;
        }
        updated.updated_at = now;
        updated
    }
}

/// Response payload for geofence operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceResponse {
    pub id: Uuid,
    pub name: String,
    pub shape: GeofenceShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub dwell_seconds: u32,
    pub active: bool,
    pub notifications: Vec<NotificationTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Geofence> for GeofenceResponse {
    fn from(g: Geofence) -> Self {
        Self {
            id: g.id,
            name: g.name,
            shape: g.shape,
            parent_id: g.parent_id,
            dwell_seconds: g.dwell_seconds,
            active: g.active,
            notifications: g.notifications,
            metadata: g.metadata,
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

/// Response for listing geofences.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesResponse {
    pub geofences: Vec<GeofenceResponse>,
    pub total: usize,
}

/// Query parameters for listing geofences.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Request payload for a stateless containment check.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckPointRequest {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

/// Containment result for a single zone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCheck {
    pub geofence_id: Uuid,
    pub name: String,
    /// Signed distance to the zone boundary: negative inside, positive outside.
    pub distance_to_boundary_meters: f64,
}

/// Response payload for a containment check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPointResponse {
    pub latitude: f64,
    pub longitude: f64,
    /// Zones containing the point, innermost first.
    pub inside: Vec<ZoneCheck>,
}
