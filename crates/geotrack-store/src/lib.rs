//! GeoTrack Store - Collaborator ports and adapters
//!
//! This crate defines the ports the tracking engine talks to (geofence
//! persistence, last-known-location storage, event sinks) and provides
//! in-memory, JSON-file, and broadcast adapters.

pub mod broadcast;
pub mod file;
pub mod memory;
pub mod ports;
