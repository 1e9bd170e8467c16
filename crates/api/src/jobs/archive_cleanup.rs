//! Location archive retention job.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use domain::services::LocationArchive;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

/// Drops archived location days older than the retention window.
pub struct ArchiveCleanupJob {
    archive: Arc<dyn LocationArchive>,
    retention_days: u32,
}

impl ArchiveCleanupJob {
    pub fn new(archive: Arc<dyn LocationArchive>, retention_days: u32) -> Self {
        Self {
            archive,
            retention_days,
        }
    }

    /// First day still kept when today is `today`.
    fn cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        today.checked_sub_days(Days::new(u64::from(self.retention_days)))
    }
}

#[async_trait::async_trait]
impl Job for ArchiveCleanupJob {
    fn name(&self) -> &'static str {
        "archive_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(60)
    }

    async fn execute(&self) -> Result<(), String> {
        let Some(cutoff) = self.cutoff(Utc::now().date_naive()) else {
            return Err(format!(
                "Retention of {} days is out of range",
                self.retention_days
            ));
        };

        let deleted = self
            .archive
            .prune_before(cutoff)
            .await
            .map_err(|e| format!("Failed to prune location archive: {}", e))?;

        if deleted > 0 {
            info!(
                deleted = deleted,
                retention_days = self.retention_days,
                cutoff = %cutoff,
                "Cleaned up old archived locations"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::models::{Coordinate, LocationUpdate};
    use domain::services::InMemoryLocationArchive;
    use uuid::Uuid;

    #[test]
    fn test_cutoff_is_retention_days_back() {
        let job = ArchiveCleanupJob::new(Arc::new(InMemoryLocationArchive::new()), 30);
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(job.cutoff(today), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(job.name(), "archive_cleanup");
        assert_eq!(job.frequency(), JobFrequency::Minutes(60));
    }

    #[tokio::test]
    async fn test_execute_drops_expired_days() {
        let archive = Arc::new(InMemoryLocationArchive::new());
        let device = Uuid::new_v4();
        let now = Utc::now();
        for age in [Duration::days(40), Duration::days(31), Duration::days(1), Duration::zero()] {
            archive
                .store(&LocationUpdate::new(device, Coordinate::new(0.0, 0.0), now - age))
                .await
                .unwrap();
        }

        let job = ArchiveCleanupJob::new(archive.clone(), 30);
        job.execute().await.unwrap();

        assert_eq!(archive.len().await, 2);
        let dates = archive.list_dates().await.unwrap();
        assert!(dates.iter().all(|d| *d >= (now - Duration::days(30)).date_naive()));
    }

    #[tokio::test]
    async fn test_execute_with_out_of_range_retention_fails() {
        let job = ArchiveCleanupJob::new(Arc::new(InMemoryLocationArchive::new()), u32::MAX);
        assert!(job.execute().await.is_err());
    }
}
