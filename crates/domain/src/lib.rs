//! Domain layer for the geofence engine.
//!
//! This crate contains:
//! - Domain models (Geofence, LocationUpdate, ZoneMembership, AlertEvent)
//! - The evaluation pipeline: spatial index, hierarchy resolver, dwell tracker,
//!   evaluation engine and alert dispatcher
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::GeofenceError;
