//! GeoTrack Core - Domain models, errors, and configuration
//!
//! This crate contains the shared vocabulary of the tracking system: points,
//! location reports, geofences, location events, and districts.

pub mod config;
pub mod error;
pub mod models;

pub use error::{Result, TrackError};
