//! Drops stale `outside` memberships so idle devices do not pin memory.

use std::sync::Arc;

use chrono::Utc;
use domain::services::GeofenceEngine;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct MembershipCleanupJob {
    engine: Arc<GeofenceEngine>,
}

impl MembershipCleanupJob {
    pub fn new(engine: Arc<GeofenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl Job for MembershipCleanupJob {
    fn name(&self) -> &'static str {
        "membership_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(5)
    }

    async fn execute(&self) -> Result<(), String> {
        let pruned = self.engine.prune_memberships(Utc::now());
        if pruned > 0 {
            info!(pruned = pruned, "Pruned stale zone memberships");
        }
        Ok(())
    }
}
