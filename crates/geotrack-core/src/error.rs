//! Error types for GeoTrack

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{BookingId, GeofenceId, WorkerId};

#[derive(Debug, Error)]
pub enum TrackError {
    // Report errors
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(
        "Stale report for booking {booking_id}, worker {worker_id}: {timestamp} is older than last accepted {last_accepted}"
    )]
    StaleReport {
        booking_id: BookingId,
        worker_id: WorkerId,
        timestamp: DateTime<Utc>,
        last_accepted: DateTime<Utc>,
    },

    // Geofence errors
    #[error("Geofence {id} is already active. Remove it before registering again")]
    DuplicateGeofence { id: GeofenceId },

    #[error("Geofence not found: {id}")]
    GeofenceNotFound { id: GeofenceId },

    // Reference data errors
    #[error("Invalid region dataset: {reason}")]
    RegionData { reason: String },

    // Collaborator errors
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrackError {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TrackError::Validation { field: field.into(), reason: reason.into() }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        TrackError::Storage { reason: reason.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TrackError::Validation { .. })
    }

    /// Stale reports are expected under network jitter and are never fatal
    pub fn is_stale(&self) -> bool {
        matches!(self, TrackError::StaleReport { .. })
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;
