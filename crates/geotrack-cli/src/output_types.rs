use geotrack_core::models::{BoundingBox, GeoPoint, Geofence, LocationEvent, Region};
use serde::Serialize;
use tabled::Tabled;

/// Output for resolve command
#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    pub point: GeoPoint,
    pub outer_bounds: BoundingBox,
    /// `None` when the point lies outside the outer bound
    pub region: Option<Region>,
}

/// Output for regions command
#[derive(Debug, Serialize)]
pub struct RegionsOutput {
    pub path: String,
    pub extent: BoundingBox,
    pub regions: Vec<Region>,
}

#[derive(Tabled)]
pub struct RegionRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Bounding Box")]
    pub bounding_box: String,
    #[tabled(rename = "Center")]
    pub center: String,
}

impl From<&Region> for RegionRow {
    fn from(region: &Region) -> Self {
        Self {
            name: region.name.clone(),
            bounding_box: region.bounding_box.to_string(),
            center: region.center_point.to_string(),
        }
    }
}

/// Output for geofence list/add/remove
#[derive(Debug, Serialize)]
pub struct GeofencesOutput {
    pub path: String,
    pub geofences: Vec<Geofence>,
}

#[derive(Tabled)]
pub struct GeofenceRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Booking")]
    pub booking: u64,
    #[tabled(rename = "Type")]
    pub geofence_type: String,
    #[tabled(rename = "Center")]
    pub center: String,
    #[tabled(rename = "Radius (m)")]
    pub radius: f64,
    #[tabled(rename = "Active")]
    pub active: String,
}

impl From<&Geofence> for GeofenceRow {
    fn from(geofence: &Geofence) -> Self {
        Self {
            id: geofence.id.to_string(),
            booking: geofence.booking_id.0,
            geofence_type: geofence.geofence_type.to_string(),
            center: geofence.center.to_string(),
            radius: geofence.radius_meters,
            active: if geofence.active { "✓" } else { "✗" }.to_string(),
        }
    }
}

/// Output for replay command
#[derive(Debug, Serialize)]
pub struct ReplayOutput {
    pub reports: usize,
    pub accepted: usize,
    pub dropped: usize,
    pub rejected: usize,
    pub geofences: usize,
    pub events: Vec<LocationEvent>,
}

#[derive(Tabled)]
pub struct EventRow {
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Worker")]
    pub worker: u64,
    #[tabled(rename = "Event")]
    pub event_type: String,
    #[tabled(rename = "Geofence")]
    pub geofence: String,
    #[tabled(rename = "Point")]
    pub point: String,
}

impl From<&LocationEvent> for EventRow {
    fn from(event: &LocationEvent) -> Self {
        Self {
            time: event.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            worker: event.worker_id.0,
            event_type: event.event_type.to_string(),
            geofence: event.geofence_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            point: event.point.to_string(),
        }
    }
}

/// One configuration entry with its source
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}
