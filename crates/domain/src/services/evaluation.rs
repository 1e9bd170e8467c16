//! Geofence evaluation engine.
//!
//! Turns a stream of location updates into zone transition alerts. Zones live
//! in a registry behind a read/write lock; device state lives in per-device
//! partitions, each behind its own mutex, so updates for different devices
//! are evaluated concurrently while updates for one device are serialized.
//!
//! Evaluation of a single update:
//! 1. reject malformed coordinates and out-of-order timestamps;
//! 2. query the spatial index and resolve the zone hierarchy;
//! 3. feed outside signals for memberships no longer matched, then inside
//!    signals for matched zones;
//! 4. record the update as the device's latest fix.
//!
//! State is only mutated after every fallible step has passed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dwell::{DwellPolicy, DwellTracker, ExitPolicy};
use super::hierarchy;
use super::spatial_index::{SpatialIndex, DEFAULT_CELL_DEGREES, DEFAULT_LINEAR_SCAN_THRESHOLD};
use super::zone_registry::GeofenceRegistry;
use crate::error::GeofenceError;
use crate::models::geofence::{UpdateGeofenceRequest, ZoneCheck};
use crate::models::{AlertEvent, Coordinate, Device, Geofence, LocationUpdate, ZoneMembership};

/// Tuning knobs for the evaluation engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Spatial index grid cell size in degrees.
    pub cell_degrees: f64,
    /// Up to this many zones, queries scan every zone.
    pub linear_scan_threshold: usize,
    /// Treat a device inside a child zone as inside its active ancestors.
    pub implicit_parent_containment: bool,
    pub exit_policy: ExitPolicy,
    /// How long an `Outside` membership is kept before it is pruned.
    pub membership_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cell_degrees: DEFAULT_CELL_DEGREES,
            linear_scan_threshold: DEFAULT_LINEAR_SCAN_THRESHOLD,
            implicit_parent_containment: true,
            exit_policy: ExitPolicy::Immediate,
            membership_grace_secs: 15 * 60,
        }
    }
}

impl EngineConfig {
    pub fn membership_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.membership_grace_secs.min(u64::from(u32::MAX)) as i64)
    }
}

/// Mutable state owned by a single device.
#[derive(Debug, Clone)]
pub struct DevicePartition {
    device: Device,
    tracker: DwellTracker,
}

impl DevicePartition {
    fn new(device_id: Uuid) -> Self {
        Self {
            device: Device::new(device_id),
            tracker: DwellTracker::new(device_id),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn tracker(&self) -> &DwellTracker {
        &self.tracker
    }
}

/// Result of applying one location update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Transitions in emission order.
    pub alerts: Vec<AlertEvent>,
    /// The update repeated an already applied fix and changed nothing.
    pub replay: bool,
}

/// An outside signal planned under the registry read lock.
struct PlannedExit {
    geofence_id: Uuid,
    depth: usize,
}

/// Stateful evaluator of location updates against registered geofences.
pub struct GeofenceEngine {
    config: EngineConfig,
    registry: RwLock<GeofenceRegistry>,
    devices: RwLock<HashMap<Uuid, Arc<Mutex<DevicePartition>>>>,
}

impl GeofenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let index = SpatialIndex::new(config.cell_degrees, config.linear_scan_threshold);
        Self {
            config,
            registry: RwLock::new(GeofenceRegistry::new(index)),
            devices: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- zone management ----

    pub fn register_geofence(&self, geofence: Geofence) -> Result<Geofence, GeofenceError> {
        let registered = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(geofence)?;
        info!(
            geofence_id = %registered.id,
            shape = registered.shape.kind(),
            parent_id = ?registered.parent_id,
            dwell_seconds = registered.dwell_seconds,
            "Geofence registered"
        );
        Ok(registered)
    }

    /// Applies a partial update atomically with respect to other registry writers.
    pub fn update_geofence(
        &self,
        id: Uuid,
        request: UpdateGeofenceRequest,
        now: DateTime<Utc>,
    ) -> Result<Geofence, GeofenceError> {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let current = registry.get(id).ok_or(GeofenceError::NotFound(id))?;
        let candidate = request.apply(current, now);
        let updated = registry.update(candidate)?;
        info!(geofence_id = %id, active = updated.active, "Geofence updated");
        Ok(updated)
    }

    /// Removes a zone. Memberships referring to it are dropped silently on
    /// each device's next update.
    pub fn remove_geofence(&self, id: Uuid) -> Result<Geofence, GeofenceError> {
        let removed = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)?;
        info!(geofence_id = %id, "Geofence removed");
        Ok(removed)
    }

    pub fn geofence(&self, id: Uuid) -> Option<Geofence> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn list_geofences(&self, include_inactive: bool) -> Vec<Geofence> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list(include_inactive)
    }

    pub fn geofence_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Zones containing `point`, innermost first, without touching device state.
    pub fn check_point(&self, point: Coordinate) -> Result<Vec<ZoneCheck>, GeofenceError> {
        point.check().map_err(GeofenceError::Validation)?;
        Ok(self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .check_point(point, self.config.implicit_parent_containment))
    }

    // ---- evaluation ----

    /// Evaluates one location update and returns the resulting transitions:
    /// exits first, then entries, each innermost first.
    pub fn evaluate(&self, update: &LocationUpdate) -> Result<Vec<AlertEvent>, GeofenceError> {
        self.process(update).map(|evaluation| evaluation.alerts)
    }

    /// Like [`evaluate`](Self::evaluate), but also reports replayed updates.
    pub fn process(&self, update: &LocationUpdate) -> Result<Evaluation, GeofenceError> {
        if let Err(message) = update.check() {
            warn!(
                device_id = %update.device_id,
                error = %message,
                "Rejected malformed location update"
            );
            return Err(GeofenceError::InvalidLocation(message));
        }

        let partition = self.partition(update.device_id);
        let mut partition = partition.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last_applied) = partition.device.last_update {
            if update.timestamp < last_applied {
                return Err(GeofenceError::StaleUpdate {
                    device_id: update.device_id,
                    timestamp: update.timestamp,
                    last_applied,
                });
            }
        }
        if partition.device.is_replay(update) {
            debug!(device_id = %update.device_id, "Ignoring replayed location update");
            return Ok(Evaluation {
                alerts: Vec::new(),
                replay: true,
            });
        }

        let (candidates, mut exits, forgotten) = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            let candidates =
                registry.resolve(update.coordinate, self.config.implicit_parent_containment);
            let matched: HashSet<Uuid> = candidates.iter().map(|z| z.geofence_id).collect();

            let mut exits = Vec::new();
            let mut forgotten = Vec::new();
            for zone_id in partition.tracker.active_zones() {
                if matched.contains(&zone_id) {
                    continue;
                }
                match registry.get(zone_id) {
                    Some(zone) if zone.active => exits.push(PlannedExit {
                        geofence_id: zone_id,
                        depth: hierarchy::ancestors(&*registry, zone_id).len(),
                    }),
                    _ => forgotten.push(zone_id),
                }
            }
            (candidates, exits, forgotten)
        };

        exits.sort_by(|a, b| {
            b.depth
                .cmp(&a.depth)
                .then_with(|| a.geofence_id.cmp(&b.geofence_id))
        });

        let now = update.timestamp;
        let exit_policy = self.config.exit_policy;
        let mut events = Vec::new();

        for zone_id in forgotten {
            partition.tracker.forget(zone_id);
            debug!(
                device_id = %update.device_id,
                geofence_id = %zone_id,
                "Dropped membership for removed or inactive geofence"
            );
        }

        for exit in exits {
            if let Some(kind) = partition
                .tracker
                .signal_outside(exit.geofence_id, now, exit_policy)
            {
                events.push(AlertEvent::new(
                    exit.geofence_id,
                    update.device_id,
                    kind,
                    now,
                    update.coordinate,
                ));
            }
        }

        for zone in candidates {
            let policy = DwellPolicy::new(zone.dwell, exit_policy);
            if let Some(kind) = partition.tracker.signal_inside(zone.geofence_id, now, policy) {
                events.push(AlertEvent::new(
                    zone.geofence_id,
                    update.device_id,
                    kind,
                    now,
                    update.coordinate,
                ));
            }
        }

        partition.device.record(update);

        for event in &events {
            info!(
                device_id = %event.device_id,
                geofence_id = %event.geofence_id,
                transition = %event.transition,
                "Geofence transition"
            );
        }

        Ok(Evaluation {
            alerts: events,
            replay: false,
        })
    }

    // ---- device state ----

    /// Memberships tracked for a device, ordered by geofence id.
    pub fn memberships(&self, device_id: Uuid) -> Vec<ZoneMembership> {
        let Some(partition) = self.existing_partition(device_id) else {
            return Vec::new();
        };
        let partition = partition.lock().unwrap_or_else(PoisonError::into_inner);
        let mut memberships: Vec<ZoneMembership> =
            partition.tracker.memberships().cloned().collect();
        memberships.sort_by_key(|m| m.geofence_id);
        memberships
    }

    pub fn device(&self, device_id: Uuid) -> Option<Device> {
        let partition = self.existing_partition(device_id)?;
        let partition = partition.lock().unwrap_or_else(PoisonError::into_inner);
        Some(partition.device.clone())
    }

    pub fn device_count(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops `Outside` memberships older than the grace period across all devices.
    pub fn prune_memberships(&self, now: DateTime<Utc>) -> usize {
        let partitions: Vec<Arc<Mutex<DevicePartition>>> = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let grace = self.config.membership_grace();
        partitions
            .iter()
            .map(|partition| {
                partition
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tracker
                    .prune_outside(now, grace)
            })
            .sum()
    }

    fn existing_partition(&self, device_id: Uuid) -> Option<Arc<Mutex<DevicePartition>>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device_id)
            .cloned()
    }

    /// Get or create the partition for a device.
    fn partition(&self, device_id: Uuid) -> Arc<Mutex<DevicePartition>> {
        if let Some(partition) = self.existing_partition(device_id) {
            return partition;
        }

        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        // Double-check after acquiring write lock
        devices
            .entry(device_id)
            .or_insert_with(|| Arc::new(Mutex::new(DevicePartition::new(device_id))))
            .clone()
    }
}

impl Default for GeofenceEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for GeofenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceEngine")
            .field("config", &self.config)
            .field("geofences", &self.geofence_count())
            .field("devices", &self.device_count())
            .finish()
    }
}
