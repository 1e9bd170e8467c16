//! Registry of geofences and their spatial index.
//!
//! All geometry and hierarchy validation happens here, at registration, so
//! the evaluation path can assume every indexed shape is well formed.

use std::collections::HashMap;

use uuid::Uuid;

use super::hierarchy::{self, ResolvedZone, ZoneLookup};
use super::spatial_index::{PreparedShape, SpatialIndex};
use crate::error::GeofenceError;
use crate::models::geofence::{validation_message, ZoneCheck, MAX_NOTIFICATION_TARGETS};
use crate::models::{Coordinate, Geofence};

/// Geofence records keyed by id plus the index over their shapes.
#[derive(Debug, Clone, Default)]
pub struct GeofenceRegistry {
    zones: HashMap<Uuid, Geofence>,
    index: SpatialIndex,
}

impl GeofenceRegistry {
    pub fn new(index: SpatialIndex) -> Self {
        Self {
            zones: HashMap::new(),
            index,
        }
    }

    /// Adds a new geofence after validating its geometry and parent link.
    pub fn register(&mut self, geofence: Geofence) -> Result<Geofence, GeofenceError> {
        if self.zones.contains_key(&geofence.id) {
            return Err(GeofenceError::AlreadyExists(geofence.id));
        }
        let shape = validate(&geofence)?;
        hierarchy::check_parent(&self.zones, geofence.id, geofence.parent_id)?;

        self.index.insert(geofence.id, shape);
        self.zones.insert(geofence.id, geofence.clone());
        Ok(geofence)
    }

    /// Replaces an existing geofence, re-indexing its shape.
    pub fn update(&mut self, geofence: Geofence) -> Result<Geofence, GeofenceError> {
        if !self.zones.contains_key(&geofence.id) {
            return Err(GeofenceError::NotFound(geofence.id));
        }
        let shape = validate(&geofence)?;
        hierarchy::check_parent(&self.zones, geofence.id, geofence.parent_id)?;

        self.index.insert(geofence.id, shape);
        self.zones.insert(geofence.id, geofence.clone());
        Ok(geofence)
    }

    /// Removes a geofence. Children keep their dangling parent reference.
    pub fn remove(&mut self, id: Uuid) -> Result<Geofence, GeofenceError> {
        let removed = self.zones.remove(&id).ok_or(GeofenceError::NotFound(id))?;
        self.index.remove(id);
        Ok(removed)
    }

    pub fn get(&self, id: Uuid) -> Option<&Geofence> {
        self.zones.get(&id)
    }

    /// Registered geofences, oldest first.
    pub fn list(&self, include_inactive: bool) -> Vec<Geofence> {
        let mut zones: Vec<Geofence> = self
            .zones
            .values()
            .filter(|z| include_inactive || z.active)
            .cloned()
            .collect();
        zones.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones whose geometry contains `point`, active or not.
    pub fn query(&self, point: Coordinate) -> Vec<Uuid> {
        self.index.query(point)
    }

    /// Active zones the point is inside, innermost first.
    pub fn resolve(&self, point: Coordinate, expand_ancestors: bool) -> Vec<ResolvedZone> {
        let direct = self.index.query(point);
        hierarchy::resolve(&self.zones, &direct, expand_ancestors)
    }

    /// Stateless containment check with signed boundary distances.
    pub fn check_point(&self, point: Coordinate, expand_ancestors: bool) -> Vec<ZoneCheck> {
        self.resolve(point, expand_ancestors)
            .into_iter()
            .filter_map(|resolved| {
                let zone = self.zones.get(&resolved.geofence_id)?;
                let distance = self.index.distance_to_boundary(zone.id, point)?;
                Some(ZoneCheck {
                    geofence_id: zone.id,
                    name: zone.name.clone(),
                    distance_to_boundary_meters: distance,
                })
            })
            .collect()
    }
}

impl ZoneLookup for GeofenceRegistry {
    fn zone(&self, id: Uuid) -> Option<&Geofence> {
        self.zones.get(&id)
    }
}

/// Checks every registration-time invariant and returns the prepared shape.
fn validate(geofence: &Geofence) -> Result<PreparedShape, GeofenceError> {
    let name_len = geofence.name.trim().chars().count();
    if name_len == 0 || geofence.name.chars().count() > 100 {
        return Err(GeofenceError::Validation(
            "Name must be 1-100 characters".to_string(),
        ));
    }

    shared::validation::validate_dwell_seconds(geofence.dwell_seconds)
        .map_err(|e| GeofenceError::Validation(validation_message(e)))?;

    if geofence.notifications.len() > MAX_NOTIFICATION_TARGETS {
        return Err(GeofenceError::Validation(format!(
            "At most {} notification targets are allowed",
            MAX_NOTIFICATION_TARGETS
        )));
    }
    for target in &geofence.notifications {
        target.check().map_err(GeofenceError::Validation)?;
    }

    PreparedShape::prepare(&geofence.shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeofenceShape, NotificationTarget};
    use chrono::Utc;

    fn circle_zone(lat: f64, lon: f64, radius: f64) -> Geofence {
        let now = Utc::now();
        Geofence {
            id: Uuid::new_v4(),
            name: "Warehouse".to_string(),
            shape: GeofenceShape::Circle {
                center: Coordinate::new(lat, lon),
                radius_meters: radius,
            },
            parent_id: None,
            dwell_seconds: 0,
            active: true,
            notifications: vec![],
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_register_and_query() {
        let mut registry = GeofenceRegistry::default();
        let zone = registry.register(circle_zone(0.0, 0.0, 100.0)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.query(Coordinate::new(0.0, 0.0)), vec![zone.id]);
        assert!(registry.query(Coordinate::new(0.009, 0.0)).is_empty());
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let mut registry = GeofenceRegistry::default();
        let zone = registry.register(circle_zone(0.0, 0.0, 100.0)).unwrap();
        assert_eq!(
            registry.register(zone.clone()).unwrap_err(),
            GeofenceError::AlreadyExists(zone.id)
        );
    }

    #[test]
    fn test_register_invalid_geometry_rejected() {
        let mut registry = GeofenceRegistry::default();
        let mut zone = circle_zone(0.0, 0.0, 100.0);
        zone.shape = GeofenceShape::Polygon {
            vertices: vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.0, 1.0),
                Coordinate::new(1.0, 0.0),
                Coordinate::new(0.0, 1.0),
            ],
        };
        assert!(matches!(
            registry.register(zone),
            Err(GeofenceError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_invalid_notification_target_rejected() {
        let mut registry = GeofenceRegistry::default();
        let mut zone = circle_zone(0.0, 0.0, 100.0);
        zone.notifications = vec![NotificationTarget::Email {
            address: "nope".to_string(),
        }];
        assert!(registry.register(zone).is_err());
    }

    #[test]
    fn test_update_moves_zone_and_rejects_cycles() {
        let mut registry = GeofenceRegistry::default();
        let parent = registry.register(circle_zone(0.0, 0.0, 5_000.0)).unwrap();
        let mut child = circle_zone(0.0, 0.0, 100.0);
        child.parent_id = Some(parent.id);
        let child = registry.register(child).unwrap();

        let mut looped = parent.clone();
        looped.parent_id = Some(child.id);
        assert!(matches!(
            registry.update(looped),
            Err(GeofenceError::ParentCycle { .. })
        ));

        let mut moved = child.clone();
        moved.shape = GeofenceShape::Circle {
            center: Coordinate::new(10.0, 10.0),
            radius_meters: 100.0,
        };
        registry.update(moved).unwrap();
        assert_eq!(registry.query(Coordinate::new(0.0, 0.0)), vec![parent.id]);
        assert_eq!(registry.query(Coordinate::new(10.0, 10.0)), vec![child.id]);

        let unknown = circle_zone(0.0, 0.0, 100.0);
        assert_eq!(
            registry.update(unknown.clone()).unwrap_err(),
            GeofenceError::NotFound(unknown.id)
        );
    }

    #[test]
    fn test_remove_and_list() {
        let mut registry = GeofenceRegistry::default();
        let a = registry.register(circle_zone(0.0, 0.0, 100.0)).unwrap();
        let mut inactive = circle_zone(1.0, 1.0, 100.0);
        inactive.active = false;
        let b = registry.register(inactive).unwrap();

        assert_eq!(registry.list(false).len(), 1);
        assert_eq!(registry.list(true).len(), 2);

        assert_eq!(registry.remove(a.id).unwrap().id, a.id);
        assert_eq!(registry.remove(a.id).unwrap_err(), GeofenceError::NotFound(a.id));
        assert!(registry.query(Coordinate::new(0.0, 0.0)).is_empty());
        assert!(registry.get(b.id).is_some());
    }

    #[test]
    fn test_check_point_reports_nested_zones() {
        let mut registry = GeofenceRegistry::default();
        let mut outer = circle_zone(0.0, 0.0, 5_000.0);
        outer.name = "Campus".to_string();
        let outer = registry.register(outer).unwrap();
        let mut inner = circle_zone(0.0, 0.0, 100.0);
        inner.name = "Lobby".to_string();
        inner.parent_id = Some(outer.id);
        let inner = registry.register(inner).unwrap();

        let checks = registry.check_point(Coordinate::new(0.0, 0.0), true);
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].geofence_id, inner.id);
        assert_eq!(checks[0].name, "Lobby");
        assert!((checks[0].distance_to_boundary_meters + 100.0).abs() < 1e-6);
        assert_eq!(checks[1].geofence_id, outer.id);

        assert!(registry.check_point(Coordinate::new(5.0, 5.0), true).is_empty());
    }
}
