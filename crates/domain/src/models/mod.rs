//! Domain models for the geofence engine.

pub mod alert;
pub mod device;
pub mod geofence;
pub mod location;
pub mod membership;
pub mod notification;

pub use alert::{AlertEvent, DedupKey, TransitionKind};
pub use device::Device;
pub use geofence::{Coordinate, Geofence, GeofenceShape};
pub use location::LocationUpdate;
pub use membership::{MembershipState, ZoneMembership};
pub use notification::{
    AlertNotification, ChannelKind, DeliveryFailure, NotificationLocation, NotificationTarget,
};
