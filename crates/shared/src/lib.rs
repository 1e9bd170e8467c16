//! Shared utilities and common types for the geofence engine.
//!
//! This crate provides common functionality used across all other crates:
//! - Coordinate and value validation for request DTOs
//! - Geodesy helpers (haversine distance, degree/meter conversion)

pub mod geodesy;
pub mod validation;
