//! Per-pair tracking state and the keyed lock that serializes access to it

use chrono::{DateTime, Utc};
use geotrack_core::models::{BookingId, GeoPoint, GeofenceId, PairKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Membership flag tagged with the geofence registration it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Membership {
    pub generation: u64,
    pub inside: bool,
}

/// Everything the engine remembers about one (booking, worker) pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairState {
    pub(crate) membership: HashMap<GeofenceId, Membership>,
    pub(crate) last_accepted: Option<DateTime<Utc>>,
    pub(crate) last_point: Option<GeoPoint>,
    pub(crate) arrived: bool,
}

impl PairState {
    /// Timestamp of the most recent accepted report
    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }

    /// Position of the most recent accepted report
    pub fn last_point(&self) -> Option<GeoPoint> {
        self.last_point
    }

    /// Whether an arrival at the client location has ever been recorded
    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    /// Membership flag for a geofence registration; absent counts as outside
    pub(crate) fn is_inside(&self, id: GeofenceId, generation: u64) -> bool {
        self.membership
            .get(&id)
            .filter(|m| m.generation == generation)
            .map(|m| m.inside)
            .unwrap_or(false)
    }
}

/// Lazily created per-pair state, each behind its own async mutex.
///
/// The outer map lock is only held long enough to clone the `Arc`.
#[derive(Debug, Default)]
pub struct PairRegistry {
    pairs: Mutex<HashMap<PairKey, Arc<tokio::sync::Mutex<PairState>>>>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to a pair's state, created on first use
    pub fn handle(&self, key: PairKey) -> Arc<tokio::sync::Mutex<PairState>> {
        // Every mutation is a single map call, so a poisoned lock still holds valid data
        let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        pairs.entry(key).or_default().clone()
    }

    /// Drop the state of every pair of a booking, returning how many were dropped.
    ///
    /// A task still holding a handle keeps its own copy; later reports start fresh.
    pub fn remove_booking(&self, booking_id: BookingId) -> usize {
        let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = pairs.len();
        pairs.retain(|key, _| key.booking_id != booking_id);
        before - pairs.len()
    }

    /// Number of pairs with live state
    pub fn len(&self) -> usize {
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
