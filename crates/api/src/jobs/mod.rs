//! Background job scheduler and job implementations.

mod archive_cleanup;
mod dedup_cleanup;
mod engine_metrics;
mod membership_cleanup;
mod scheduler;

pub use archive_cleanup::ArchiveCleanupJob;
pub use dedup_cleanup::DedupCleanupJob;
pub use engine_metrics::EngineMetricsJob;
pub use membership_cleanup::MembershipCleanupJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
