//! In-memory storage implementations for development and testing.
//!
//! These implementations use `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state.

use async_trait::async_trait;
use geotrack_core::error::Result;
use geotrack_core::models::{
    BookingId, Geofence, GeofenceId, LocationEvent, LocationReport, PairKey,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ports::{EventSink, GeofenceStore, LocationStore, Transaction};

/// In-memory implementation of GeofenceStore
#[derive(Debug, Clone, Default)]
pub struct MemoryGeofenceStore {
    geofences: Arc<RwLock<HashMap<GeofenceId, Geofence>>>,
}

impl MemoryGeofenceStore {
    /// Create a new in-memory geofence store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeofenceStore for MemoryGeofenceStore {
    async fn save_geofence(&self, geofence: &Geofence) -> Result<()> {
        let mut geofences = self.geofences.write().unwrap();
        geofences.insert(geofence.id, geofence.clone());
        Ok(())
    }

    async fn deactivate_geofence(&self, id: GeofenceId) -> Result<()> {
        let mut geofences = self.geofences.write().unwrap();
        if let Some(geofence) = geofences.get_mut(&id) {
            geofence.active = false;
        }
        Ok(())
    }

    async fn get_geofence(&self, id: GeofenceId) -> Result<Option<Geofence>> {
        let geofences = self.geofences.read().unwrap();
        Ok(geofences.get(&id).cloned())
    }

    async fn load_active(&self) -> Result<Vec<Geofence>> {
        let geofences = self.geofences.read().unwrap();
        let mut active: Vec<Geofence> = geofences.values().filter(|g| g.active).cloned().collect();
        active.sort_by_key(|g| (g.booking_id, g.id));
        Ok(active)
    }
}

/// In-memory implementation of LocationStore
#[derive(Debug, Clone, Default)]
pub struct MemoryLocationStore {
    locations: Arc<RwLock<HashMap<PairKey, LocationReport>>>,
}

impl MemoryLocationStore {
    /// Create a new in-memory location store
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore one pair to a previous state (for rollback)
    fn restore(&self, key: PairKey, previous: Option<LocationReport>) {
        let mut locations = self.locations.write().unwrap();
        match previous {
            Some(report) => locations.insert(key, report),
            None => locations.remove(&key),
        };
    }
}

/// Transaction for MemoryLocationStore.
///
/// Snapshots a single pair; callers serialize work per pair, so a
/// per-key snapshot is enough to undo a partial write.
pub struct MemoryLocationTransaction {
    key: PairKey,
    previous: Option<LocationReport>,
    store: MemoryLocationStore,
    committed: bool,
}

#[async_trait]
impl Transaction for MemoryLocationTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.committed = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        if !self.committed {
            self.store.restore(self.key, self.previous);
        }
        Ok(())
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn begin_transaction(&self, key: PairKey) -> Result<Box<dyn Transaction>> {
        let previous = self.locations.read().unwrap().get(&key).cloned();
        Ok(Box::new(MemoryLocationTransaction {
            key,
            previous,
            store: self.clone(),
            committed: false,
        }))
    }

    async fn record_last_known(&self, report: &LocationReport) -> Result<()> {
        let mut locations = self.locations.write().unwrap();
        locations.insert(report.key(), report.clone());
        Ok(())
    }

    async fn last_known(&self, key: PairKey) -> Result<Option<LocationReport>> {
        let locations = self.locations.read().unwrap();
        Ok(locations.get(&key).cloned())
    }

    async fn last_known_for_booking(&self, booking_id: BookingId) -> Result<Vec<LocationReport>> {
        let locations = self.locations.read().unwrap();
        let mut reports: Vec<LocationReport> =
            locations.values().filter(|r| r.booking_id == booking_id).cloned().collect();
        reports.sort_by_key(|r| r.worker_id);
        Ok(reports)
    }
}

/// Append-only in-memory event log
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    events: Arc<RwLock<Vec<LocationEvent>>>,
}

impl MemoryEventLog {
    /// Create an empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in publication order
    pub fn events(&self) -> Vec<LocationEvent> {
        self.events.read().unwrap().clone()
    }

    /// Events of one (booking, worker) pair in publication order
    pub fn events_for(&self, key: PairKey) -> Vec<LocationEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.booking_id == key.booking_id && e.worker_id == key.worker_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().unwrap().is_empty()
    }
}

#[async_trait]
impl EventSink for MemoryEventLog {
    async fn publish(&self, events: &[LocationEvent]) -> Result<()> {
        let mut log = self.events.write().unwrap();
        log.extend_from_slice(events);
        Ok(())
    }
}

/// Publishes to a primary sink, then mirrors to the others.
///
/// Only the primary decides whether the call succeeds. Mirrors are best
/// effort: their failures are logged and never undo the primary write.
#[derive(Clone, Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventSink for FanOutSink {
    async fn publish(&self, events: &[LocationEvent]) -> Result<()> {
        let Some((primary, mirrors)) = self.sinks.split_first() else {
            return Ok(());
        };
        primary.publish(events).await?;

        for (index, mirror) in mirrors.iter().enumerate() {
            if let Err(e) = mirror.publish(events).await {
                tracing::warn!(mirror = index + 1, count = events.len(), "Mirror sink failed: {}", e);
            }
        }
        Ok(())
    }
}
