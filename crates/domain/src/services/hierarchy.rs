//! Zone hierarchy resolution.
//!
//! Geofences may name a parent zone. When a device is inside a child zone it
//! is treated as inside every active ancestor too, even if the ancestor's
//! geometry does not strictly contain the point. Parent references are weak:
//! a missing parent simply ends the chain.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::GeofenceError;
use crate::models::Geofence;

/// Upper bound on parent links followed from a single zone.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Read access to registered zones by id.
pub trait ZoneLookup {
    fn zone(&self, id: Uuid) -> Option<&Geofence>;
}

impl ZoneLookup for HashMap<Uuid, Geofence> {
    fn zone(&self, id: Uuid) -> Option<&Geofence> {
        self.get(&id)
    }
}

/// A zone the device is considered inside after hierarchy expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedZone {
    pub geofence_id: Uuid,
    /// Number of known ancestors; 0 for a root zone.
    pub depth: usize,
    /// The directly contained zone that implied this one, if it was not hit directly.
    pub implied_by: Option<Uuid>,
    /// Dwell threshold applied to this membership.
    pub dwell: chrono::Duration,
}

/// Ancestors of `id`, nearest first, following known parent links.
pub fn ancestors<L: ZoneLookup>(lookup: &L, id: Uuid) -> Vec<Uuid> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([id]);
    let mut current = lookup.zone(id).and_then(|zone| zone.parent_id);

    while let Some(parent_id) = current {
        if chain.len() >= MAX_HIERARCHY_DEPTH || !seen.insert(parent_id) {
            break;
        }
        let Some(parent) = lookup.zone(parent_id) else {
            break;
        };
        chain.push(parent_id);
        current = parent.parent_id;
    }
    chain
}

/// Resolves directly contained zones into the full ordered zone set.
///
/// The result is ordered innermost to outermost: depth descending, ties
/// broken by id. Inactive or unknown ids in `direct` are dropped. With
/// `expand_ancestors`, active ancestors of each direct zone are added using
/// the dwell of the innermost zone that implies them.
pub fn resolve<L: ZoneLookup>(lookup: &L, direct: &[Uuid], expand_ancestors: bool) -> Vec<ResolvedZone> {
    let mut direct_zones: Vec<(ResolvedZone, Vec<Uuid>)> = direct
        .iter()
        .filter_map(|id| lookup.zone(*id))
        .filter(|zone| zone.active)
        .map(|zone| {
            let chain = ancestors(lookup, zone.id);
            let resolved = ResolvedZone {
                geofence_id: zone.id,
                depth: chain.len(),
                implied_by: None,
                dwell: zone.dwell_threshold(),
            };
            (resolved, chain)
        })
        .collect();
    direct_zones.sort_by(|(a, _), (b, _)| {
        b.depth
            .cmp(&a.depth)
            .then_with(|| a.geofence_id.cmp(&b.geofence_id))
    });
    direct_zones.dedup_by(|(a, _), (b, _)| a.geofence_id == b.geofence_id);

    let mut resolved: HashMap<Uuid, ResolvedZone> = direct_zones
        .iter()
        .map(|(zone, _)| (zone.geofence_id, zone.clone()))
        .collect();

    if expand_ancestors {
        for (zone, chain) in &direct_zones {
            for (index, ancestor_id) in chain.iter().enumerate() {
                if resolved.contains_key(ancestor_id) {
                    continue;
                }
                // Inactive ancestors are skipped but the walk goes on past them.
                if !lookup.zone(*ancestor_id).map(|a| a.active).unwrap_or(false) {
                    continue;
                }
                resolved.insert(
                    *ancestor_id,
                    ResolvedZone {
                        geofence_id: *ancestor_id,
                        depth: chain.len() - index - 1,
                        implied_by: Some(zone.geofence_id),
                        dwell: zone.dwell,
                    },
                );
            }
        }
    }

    let mut zones: Vec<ResolvedZone> = resolved.into_values().collect();
    zones.sort_by(|a, b| {
        b.depth
            .cmp(&a.depth)
            .then_with(|| a.geofence_id.cmp(&b.geofence_id))
    });
    zones
}

/// Rejects a parent assignment that would make `id` its own ancestor.
///
/// Unknown parents are accepted; the reference is weak.
pub fn check_parent<L: ZoneLookup>(
    lookup: &L,
    id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<(), GeofenceError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let cycle = GeofenceError::ParentCycle {
        geofence_id: id,
        parent_id,
    };
    if parent_id == id {
        return Err(cycle);
    }
    if lookup.zone(parent_id).is_some() && ancestors(lookup, parent_id).contains(&id) {
        return Err(cycle);
    }
    Ok(())
}
