//! Domain services: spatial indexing, evaluation and alert dispatch.

pub mod archive;
pub mod dispatcher;
pub mod dwell;
pub mod evaluation;
pub mod hierarchy;
pub mod notification;
pub mod spatial_index;
pub mod zone_registry;

pub use archive::{ArchiveError, InMemoryLocationArchive, LocationArchive};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatcherConfig};
pub use dwell::{DwellPolicy, DwellTracker, ExitPolicy};
pub use evaluation::{EngineConfig, Evaluation, GeofenceEngine};
pub use hierarchy::{ResolvedZone, ZoneLookup};
pub use notification::{MockNotificationChannel, NotificationChannel, NotificationResult};
pub use spatial_index::{PreparedShape, SpatialIndex};
pub use zone_registry::GeofenceRegistry;
