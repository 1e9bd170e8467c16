//! Device domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geofence::Coordinate;
use super::location::LocationUpdate;

/// Last known state of a tracked device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub last_position: Option<Coordinate>,
    pub last_update: Option<DateTime<Utc>>,
    pub updates_applied: u64,
    /// Every position applied at `last_update`.
    #[serde(skip)]
    fixes_at_last_update: Vec<Coordinate>,
}

impl Device {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            last_position: None,
            last_update: None,
            updates_applied: 0,
            fixes_at_last_update: Vec::new(),
        }
    }

    /// Records an applied update as the device's latest fix.
    pub fn record(&mut self, update: &LocationUpdate) {
        if self.last_update != Some(update.timestamp) {
            self.fixes_at_last_update.clear();
        }
        self.fixes_at_last_update.push(update.coordinate);
        self.last_position = Some(update.coordinate);
        self.last_update = Some(update.timestamp);
        self.updates_applied += 1;
    }

    /// True when `update` repeats any fix already applied at the latest timestamp.
    pub fn is_replay(&self, update: &LocationUpdate) -> bool {
        match self.last_update {
            Some(ts) => self
                .fixes_at_last_update
                .iter()
                .any(|pos| update.is_replay_of(ts, *pos)),
            None => false,
        }
    }
}
