//! GeoTrack Geo - Distances, validation, and district resolution
//!
//! This crate handles the pure geometry of the tracking system. Nothing in
//! here holds mutable state, so every function is safe to call from any
//! number of tasks at once.

pub mod distance;
pub mod region;
pub mod validation;

pub use distance::{distance_meters, implied_speed_mps};
pub use region::{resolve_region, RegionResolver, RegionSet};
pub use validation::{
    is_valid_point, validate_geofence, validate_point, validate_report, ValidationError,
    ValidationResult,
};
