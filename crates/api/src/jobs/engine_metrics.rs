//! Background job to record engine gauges.

use std::sync::Arc;

use domain::services::{AlertDispatcher, GeofenceEngine};

use super::scheduler::{Job, JobFrequency};
use crate::middleware::metrics::{record_engine_stats, record_geofence_count};

/// Periodically publishes zone, device and delivery gauges.
pub struct EngineMetricsJob {
    engine: Arc<GeofenceEngine>,
    dispatcher: Arc<AlertDispatcher>,
}

impl EngineMetricsJob {
    pub fn new(engine: Arc<GeofenceEngine>, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self { engine, dispatcher }
    }
}

#[async_trait::async_trait]
impl Job for EngineMetricsJob {
    fn name(&self) -> &'static str {
        "engine_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), String> {
        record_geofence_count(self.engine.geofence_count());
        record_engine_stats(self.engine.device_count(), self.dispatcher.in_flight());
        Ok(())
    }
}
