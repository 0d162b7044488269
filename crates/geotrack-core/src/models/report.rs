use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::point::GeoPoint;

/// Unique identifier for a booking (unit of work)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub u64);

/// Unique identifier for a worker device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The serialization scope for report processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub booking_id: BookingId,
    pub worker_id: WorkerId,
}

impl PairKey {
    pub fn new(booking_id: BookingId, worker_id: WorkerId) -> Self {
        Self { booking_id, worker_id }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "booking {}/worker {}", self.booking_id, self.worker_id)
    }
}

/// A raw position fix sent by a worker's device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    /// Booking the worker is reporting for
    pub booking_id: BookingId,

    /// Reporting worker
    #[serde(alias = "source")]
    pub worker_id: WorkerId,

    /// Reported position
    #[serde(flatten)]
    pub point: GeoPoint,

    /// Device timestamp of the fix
    pub timestamp: DateTime<Utc>,

    /// Horizontal accuracy radius in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    /// Ground speed in meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Course over ground in degrees from true north
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    /// Device battery level in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

impl LocationReport {
    pub fn new(
        booking_id: BookingId,
        worker_id: WorkerId,
        point: GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            booking_id,
            worker_id,
            point,
            timestamp,
            accuracy: None,
            speed: None,
            heading: None,
            battery_level: None,
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }

    pub fn with_speed(mut self, meters_per_second: f64) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    pub fn with_heading(mut self, degrees: f64) -> Self {
        self.heading = Some(degrees);
        self
    }

    pub fn with_battery_level(mut self, percent: f64) -> Self {
        self.battery_level = Some(percent);
        self
    }

    /// The (booking, worker) pair this report belongs to
    pub fn key(&self) -> PairKey {
        PairKey::new(self.booking_id, self.worker_id)
    }
}
