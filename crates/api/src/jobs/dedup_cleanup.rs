//! Expires alert deduplication entries older than the dedup window.

use std::sync::Arc;

use chrono::Utc;
use domain::services::AlertDispatcher;
use tracing::debug;

use super::scheduler::{Job, JobFrequency};

pub struct DedupCleanupJob {
    dispatcher: Arc<AlertDispatcher>,
}

impl DedupCleanupJob {
    pub fn new(dispatcher: Arc<AlertDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait::async_trait]
impl Job for DedupCleanupJob {
    fn name(&self) -> &'static str {
        "dedup_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self.dispatcher.prune_dedup(Utc::now());
        debug!(expired = expired, "Expired alert dedup entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::DispatcherConfig;

    #[tokio::test]
    async fn test_execute_on_empty_dispatcher() {
        let dispatcher = Arc::new(AlertDispatcher::new(DispatcherConfig::default()));
        let job = DedupCleanupJob::new(dispatcher);
        assert_eq!(job.name(), "dedup_cleanup");
        assert_eq!(job.frequency(), JobFrequency::Minutes(1));
        assert!(job.execute().await.is_ok());
    }
}
