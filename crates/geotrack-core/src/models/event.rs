use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::geofence::GeofenceId;
use super::point::GeoPoint;
use super::report::{BookingId, WorkerId};

/// Kind of tracking transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationEventType {
    GeofenceEntry,
    GeofenceExit,
    ArrivedAtClient,
    WorkCompleted,
}

impl LocationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationEventType::GeofenceEntry => "geofence_entry",
            LocationEventType::GeofenceExit => "geofence_exit",
            LocationEventType::ArrivedAtClient => "arrived_at_client",
            LocationEventType::WorkCompleted => "work_completed",
        }
    }
}

impl fmt::Display for LocationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable tracking fact derived from location reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    /// Unique identifier
    pub id: Uuid,

    pub booking_id: BookingId,

    pub worker_id: WorkerId,

    pub event_type: LocationEventType,

    /// Geofence that produced the event, if any
    pub geofence_id: Option<GeofenceId>,

    /// Position that triggered the event
    pub point: GeoPoint,

    /// Timestamp of the triggering report
    pub timestamp: DateTime<Utc>,

    /// Additional event data (distance, radius, accuracy, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LocationEvent {
    pub fn new(
        event_type: LocationEventType,
        booking_id: BookingId,
        worker_id: WorkerId,
        point: GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            worker_id,
            event_type,
            geofence_id: None,
            point,
            timestamp,
            metadata: HashMap::new(),
        }
    }

    /// Attach the producing geofence
    pub fn geofence(mut self, id: GeofenceId) -> Self {
        self.geofence_id = Some(id);
        self
    }

    /// Add a metadata entry
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
