//! Per-device dwell state machine.
//!
//! Each (device, zone) pair moves through `Outside -> Entering -> Inside ->
//! Exiting -> Outside`. An entry alert fires only once the device has been
//! observed inside for at least the zone's dwell threshold; an exit alert
//! fires only for memberships that reached `Inside`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{MembershipState, TransitionKind, ZoneMembership};

/// How an `Inside` membership leaves the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// The first outside observation ends the stay.
    #[default]
    Immediate,
    /// The device must stay outside for the dwell threshold before the exit fires.
    DwellGated,
}

/// Thresholds applied to a single transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellPolicy {
    pub dwell: chrono::Duration,
    pub exit: ExitPolicy,
}

impl DwellPolicy {
    pub fn new(dwell: chrono::Duration, exit: ExitPolicy) -> Self {
        Self { dwell, exit }
    }
}

/// Membership state machines for one device.
#[derive(Debug, Clone)]
pub struct DwellTracker {
    device_id: Uuid,
    memberships: HashMap<Uuid, ZoneMembership>,
}

impl DwellTracker {
    pub fn new(device_id: Uuid) -> Self {
        Self {
            device_id,
            memberships: HashMap::new(),
        }
    }

    /// Feeds an "inside" observation. Returns `Entered` when the stay is confirmed.
    pub fn signal_inside(
        &mut self,
        zone: Uuid,
        now: DateTime<Utc>,
        policy: DwellPolicy,
    ) -> Option<TransitionKind> {
        let device_id = self.device_id;
        let membership = self
            .memberships
            .entry(zone)
            .or_insert_with(|| ZoneMembership::new(device_id, zone, now));
        membership.updated_at = now;
        membership.dwell_seconds = policy.dwell.num_seconds();

        match membership.state {
            MembershipState::Outside => {
                membership.state = MembershipState::Entering;
                membership.entered_at = Some(now);
                membership.exited_at = None;
                promote_if_dwelled(membership, now, policy.dwell)
            }
            MembershipState::Entering => promote_if_dwelled(membership, now, policy.dwell),
            MembershipState::Inside => None,
            MembershipState::Exiting => {
                membership.state = MembershipState::Inside;
                membership.exited_at = None;
                None
            }
        }
    }

    /// Feeds an "outside" observation. Returns `Exited` when a confirmed stay ends.
    ///
    /// A gated exit waits for the dwell threshold that was applied while the
    /// device was inside, so entry and exit of one membership share a threshold.
    pub fn signal_outside(
        &mut self,
        zone: Uuid,
        now: DateTime<Utc>,
        exit: ExitPolicy,
    ) -> Option<TransitionKind> {
        let membership = self.memberships.get_mut(&zone)?;
        membership.updated_at = now;
        let dwell = membership.dwell();

        match membership.state {
            MembershipState::Outside => None,
            MembershipState::Entering => {
                membership.state = MembershipState::Outside;
                membership.entered_at = None;
                None
            }
            MembershipState::Inside => {
                membership.exited_at = Some(now);
                match exit {
                    ExitPolicy::Immediate => Some(leave(membership)),
                    ExitPolicy::DwellGated if dwell <= chrono::Duration::zero() => {
                        Some(leave(membership))
                    }
                    ExitPolicy::DwellGated => {
                        membership.state = MembershipState::Exiting;
                        None
                    }
                }
            }
            MembershipState::Exiting => {
                let since = membership.exited_at.unwrap_or(now);
                if now - since >= dwell {
                    Some(leave(membership))
                } else {
                    None
                }
            }
        }
    }

    /// Drops a membership without emitting anything.
    pub fn forget(&mut self, zone: Uuid) -> Option<ZoneMembership> {
        self.memberships.remove(&zone)
    }

    /// Drops `Outside` memberships idle for longer than `grace`. Returns how many were removed.
    pub fn prune_outside(&mut self, now: DateTime<Utc>, grace: chrono::Duration) -> usize {
        let before = self.memberships.len();
        self.memberships
            .retain(|_, m| m.state != MembershipState::Outside || now - m.updated_at <= grace);
        before - self.memberships.len()
    }

    /// Zones with a live (non-`Outside`) membership, sorted by id.
    pub fn active_zones(&self) -> Vec<Uuid> {
        let mut zones: Vec<Uuid> = self
            .memberships
            .values()
            .filter(|m| m.is_active())
            .map(|m| m.geofence_id)
            .collect();
        zones.sort();
        zones
    }

    pub fn membership(&self, zone: Uuid) -> Option<&ZoneMembership> {
        self.memberships.get(&zone)
    }

    pub fn memberships(&self) -> impl Iterator<Item = &ZoneMembership> {
        self.memberships.values()
    }

    pub fn len(&self) -> usize {
        self.memberships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }
}

fn promote_if_dwelled(
    membership: &mut ZoneMembership,
    now: DateTime<Utc>,
    dwell: chrono::Duration,
) -> Option<TransitionKind> {
    let entered_at = membership.entered_at.unwrap_or(now);
    if now - entered_at >= dwell {
        membership.state = MembershipState::Inside;
        Some(TransitionKind::Entered)
    } else {
        None
    }
}

fn leave(membership: &mut ZoneMembership) -> TransitionKind {
    membership.state = MembershipState::Outside;
    membership.entered_at = None;
    TransitionKind::Exited
}
