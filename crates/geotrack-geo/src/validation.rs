use geotrack_core::error::{Result, TrackError};
use geotrack_core::models::{GeoPoint, Geofence, LocationReport};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with the offending field
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: impl Into<String>, reason: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(ValidationError { location: location.into(), reason: reason.into() });
    }

    /// Convert into a `Result`, reporting the first error
    pub fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(TrackError::Validation { field: first.location, reason: first.reason }),
        }
    }
}

/// Returns true if the point is inside the WGS 84 ranges
pub fn is_valid_point(point: &GeoPoint) -> bool {
    point.is_valid()
}

fn check_point(result: &mut ValidationResult, prefix: &str, point: &GeoPoint) {
    if !point.latitude.is_finite() || !(-90.0..=90.0).contains(&point.latitude) {
        result.add_error(
            format!("{}latitude", prefix),
            format!("{} must be between -90 and 90", point.latitude),
        );
    }
    if !point.longitude.is_finite() || !(-180.0..=180.0).contains(&point.longitude) {
        result.add_error(
            format!("{}longitude", prefix),
            format!("{} must be between -180 and 180", point.longitude),
        );
    }
}

/// Reject out-of-range coordinates. Values are never clamped.
pub fn validate_point(point: &GeoPoint) -> Result<()> {
    let mut result = ValidationResult::valid();
    check_point(&mut result, "", point);
    result.into_result()
}

/// Validate a location report: the point plus every optional reading present
pub fn validate_report(report: &LocationReport) -> ValidationResult {
    let mut result = ValidationResult::valid();
    check_point(&mut result, "", &report.point);

    if let Some(accuracy) = report.accuracy {
        if !accuracy.is_finite() || accuracy < 0.0 {
            result.add_error("accuracy", format!("{} must be a non-negative distance", accuracy));
        }
    }

    if let Some(speed) = report.speed {
        if !speed.is_finite() || speed < 0.0 {
            result.add_error("speed", format!("{} must be a non-negative speed", speed));
        }
    }

    if let Some(heading) = report.heading {
        if !(0.0..=360.0).contains(&heading) {
            result.add_error("heading", format!("{} must be between 0 and 360", heading));
        }
    }

    if let Some(battery) = report.battery_level {
        if !(0.0..=100.0).contains(&battery) {
            result.add_error("battery_level", format!("{} must be between 0 and 100", battery));
        }
    }

    result
}

/// Validate a geofence before registration
pub fn validate_geofence(geofence: &Geofence) -> ValidationResult {
    let mut result = ValidationResult::valid();
    check_point(&mut result, "center.", &geofence.center);

    if !geofence.radius_meters.is_finite() || geofence.radius_meters <= 0.0 {
        result.add_error(
            "radius_meters",
            format!("{} must be a positive distance", geofence.radius_meters),
        );
    }

    result
}
