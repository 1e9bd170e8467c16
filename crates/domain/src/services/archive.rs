//! Location history archive.
//!
//! Accepted location updates are archived per UTC day. Archiving is a side
//! channel: callers log archive failures and carry on. Old days are dropped
//! by [`LocationArchive::prune_before`], driven by a retention job.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::LocationUpdate;

/// Errors raised by archive backends.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive unavailable: {0}")]
    Unavailable(String),
}

/// Storage for raw location history.
#[async_trait::async_trait]
pub trait LocationArchive: Send + Sync {
    /// Appends an update to its day's archive.
    async fn store(&self, update: &LocationUpdate) -> Result<(), ArchiveError>;

    /// Days with at least one archived update, ascending.
    async fn list_dates(&self) -> Result<Vec<NaiveDate>, ArchiveError>;

    /// A device's archived updates for one day, in timestamp order.
    async fn list_for_device(
        &self,
        device_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<LocationUpdate>, ArchiveError>;

    /// Drops every day strictly before `cutoff`. Returns the number of updates removed.
    async fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, ArchiveError>;
}

type DayArchive = HashMap<Uuid, Vec<LocationUpdate>>;

#[derive(Debug, Default)]
struct ArchiveState {
    days: BTreeMap<NaiveDate, DayArchive>,
    entries: usize,
}

/// Process-local archive, used by default and in tests.
///
/// Holds at most `max_entries` updates; once full, `store` fails with
/// [`ArchiveError::Unavailable`] until a prune frees room.
#[derive(Debug)]
pub struct InMemoryLocationArchive {
    state: RwLock<ArchiveState>,
    max_entries: usize,
}

impl InMemoryLocationArchive {
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(ArchiveState::default()),
            max_entries,
        }
    }

    /// Number of archived updates across all days.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryLocationArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LocationArchive for InMemoryLocationArchive {
    async fn store(&self, update: &LocationUpdate) -> Result<(), ArchiveError> {
        let mut state = self.state.write().await;
        if state.entries >= self.max_entries {
            return Err(ArchiveError::Unavailable(format!(
                "archive full ({} entries)",
                self.max_entries
            )));
        }
        state
            .days
            .entry(update.timestamp.date_naive())
            .or_default()
            .entry(update.device_id)
            .or_default()
            .push(update.clone());
        state.entries += 1;
        Ok(())
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>, ArchiveError> {
        Ok(self.state.read().await.days.keys().copied().collect())
    }

    async fn list_for_device(
        &self,
        device_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<LocationUpdate>, ArchiveError> {
        let state = self.state.read().await;
        let mut updates = state
            .days
            .get(&date)
            .and_then(|day| day.get(&device_id))
            .cloned()
            .unwrap_or_default();
        updates.sort_by_key(|u| u.timestamp);
        Ok(updates)
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, ArchiveError> {
        let mut state = self.state.write().await;
        let kept = state.days.split_off(&cutoff);
        let expired = std::mem::replace(&mut state.days, kept);
        let removed: usize = expired
            .values()
            .flat_map(|day| day.values())
            .map(Vec::len)
            .sum();
        state.entries -= removed;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_store_and_list() {
        let archive = InMemoryLocationArchive::new();
        let device = Uuid::new_v4();
        let day_one = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        let day_two = Utc.with_ymd_and_hms(2024, 3, 2, 0, 1, 0).unwrap();

        archive
            .store(&LocationUpdate::new(device, Coordinate::new(1.0, 1.0), day_two))
            .await
            .unwrap();
        archive
            .store(&LocationUpdate::new(device, Coordinate::new(1.0, 1.0), day_one))
            .await
            .unwrap();

        let dates = archive.list_dates().await.unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            ]
        );

        let updates = archive.list_for_device(device, dates[0]).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].timestamp, day_one);

        assert!(archive
            .list_for_device(Uuid::new_v4(), dates[0])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_for_device_sorted() {
        let archive = InMemoryLocationArchive::new();
        let device = Uuid::new_v4();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        for offset in [30, 10, 20] {
            let ts = base + chrono::Duration::seconds(offset);
            archive
                .store(&LocationUpdate::new(device, Coordinate::new(0.0, 0.0), ts))
                .await
                .unwrap();
        }

        let updates = archive
            .list_for_device(device, base.date_naive())
            .await
            .unwrap();
        let offsets: Vec<i64> = updates.iter().map(|u| (u.timestamp - base).num_seconds()).collect();
        assert_eq!(offsets, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_prune_before_drops_older_days() {
        let archive = InMemoryLocationArchive::new();
        let device = Uuid::new_v4();
        for day in [1, 2, 3] {
            let ts = Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap();
            for offset in 0..2 {
                archive
                    .store(&LocationUpdate::new(
                        device,
                        Coordinate::new(0.0, 0.0),
                        ts + chrono::Duration::minutes(offset),
                    ))
                    .await
                    .unwrap();
            }
        }
        assert_eq!(archive.len().await, 6);

        let cutoff = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        assert_eq!(archive.prune_before(cutoff).await.unwrap(), 4);
        assert_eq!(archive.list_dates().await.unwrap(), vec![cutoff]);
        assert_eq!(archive.len().await, 2);
        assert_eq!(archive.prune_before(cutoff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_refused_when_full() {
        let archive = InMemoryLocationArchive::with_capacity(2);
        let device = Uuid::new_v4();
        let day_one = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let day_two = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();

        for ts in [day_one, day_two] {
            archive
                .store(&LocationUpdate::new(device, Coordinate::new(0.0, 0.0), ts))
                .await
                .unwrap();
        }
        let full = archive
            .store(&LocationUpdate::new(device, Coordinate::new(0.0, 0.0), day_two))
            .await;
        assert!(matches!(full, Err(ArchiveError::Unavailable(_))));

        archive.prune_before(day_two.date_naive()).await.unwrap();
        assert!(archive
            .store(&LocationUpdate::new(device, Coordinate::new(0.0, 0.0), day_two))
            .await
            .is_ok());
    }
}
