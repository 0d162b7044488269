use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::point::GeoPoint;
use super::report::BookingId;
use crate::error::TrackError;

/// Unique identifier for a geofence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeofenceId(pub Uuid);

impl GeofenceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GeofenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GeofenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeofenceId {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| TrackError::validation("geofence_id", e.to_string()))
    }
}

/// What a geofence marks for its booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceType {
    /// Area the worker is expected to operate in
    ServiceArea,
    /// The client's address; first entry means the worker arrived
    #[default]
    ClientLocation,
    /// Where the worker started the trip
    WorkerStartPoint,
}

impl GeofenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceType::ServiceArea => "service_area",
            GeofenceType::ClientLocation => "client_location",
            GeofenceType::WorkerStartPoint => "worker_start_point",
        }
    }
}

impl fmt::Display for GeofenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A circular geofence attached to a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    /// Unique identifier
    pub id: GeofenceId,

    /// Owning booking
    pub booking_id: BookingId,

    /// Circle center
    pub center: GeoPoint,

    /// Circle radius in meters
    pub radius_meters: f64,

    /// Geofence purpose
    #[serde(rename = "type")]
    pub geofence_type: GeofenceType,

    /// Inactive geofences never produce events
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Geofence {
    /// Create an active geofence with a fresh id
    pub fn new(
        booking_id: BookingId,
        center: GeoPoint,
        radius_meters: f64,
        geofence_type: GeofenceType,
    ) -> Self {
        Self {
            id: GeofenceId::new(),
            booking_id,
            center,
            radius_meters,
            geofence_type,
            active: true,
        }
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: GeofenceId) -> Self {
        self.id = id;
        self
    }

    pub fn is_client_location(&self) -> bool {
        self.geofence_type == GeofenceType::ClientLocation
    }
}
