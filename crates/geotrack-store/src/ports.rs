use async_trait::async_trait;
use geotrack_core::error::Result;
use geotrack_core::models::{
    BookingId, Geofence, GeofenceId, LocationEvent, LocationReport, PairKey,
};

/// Port for geofence durability across restarts
#[async_trait]
pub trait GeofenceStore: Send + Sync {
    /// Insert or replace a geofence
    async fn save_geofence(&self, geofence: &Geofence) -> Result<()>;

    /// Mark a geofence inactive. Unknown ids are ignored.
    async fn deactivate_geofence(&self, id: GeofenceId) -> Result<()>;

    /// Get a geofence by ID
    async fn get_geofence(&self, id: GeofenceId) -> Result<Option<Geofence>>;

    /// All active geofences, used to rebuild engine state on startup
    async fn load_active(&self) -> Result<Vec<Geofence>>;
}

/// Port for persisting and broadcasting location events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish the events of one report. Either all are accepted or the call fails.
    async fn publish(&self, events: &[LocationEvent]) -> Result<()>;
}

/// A unit of work that can be committed or rolled back
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Port for the last known location of each (booking, worker) pair
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Begin a transaction scoped to one pair
    async fn begin_transaction(&self, key: PairKey) -> Result<Box<dyn Transaction>>;

    /// Record a report as the pair's last known location
    async fn record_last_known(&self, report: &LocationReport) -> Result<()>;

    /// Last known location of one pair
    async fn last_known(&self, key: PairKey) -> Result<Option<LocationReport>>;

    /// Last known location of every worker on a booking
    async fn last_known_for_booking(&self, booking_id: BookingId) -> Result<Vec<LocationReport>>;
}
