//! Great-circle distance helpers

use geo::{Distance, Haversine, Point};
use geotrack_core::models::GeoPoint;

/// Great-circle distance between two points in meters (haversine).
///
/// Symmetric, and exactly zero for identical points.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(Point::from(*a), Point::from(*b))
}

/// Speed implied by moving between two fixes, in meters per second.
///
/// Returns `None` when the elapsed time is not positive.
pub fn implied_speed_mps(from: &GeoPoint, to: &GeoPoint, elapsed_seconds: f64) -> Option<f64> {
    if elapsed_seconds <= 0.0 || !elapsed_seconds.is_finite() {
        return None;
    }
    Some(distance_meters(from, to) / elapsed_seconds)
}
