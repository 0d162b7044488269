//! Tracking service facade
//!
//! Wires the geofence engine, the stream processor and the collaborator ports
//! into the interface a transport layer calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geotrack_core::config::LayeredConfig;
use geotrack_core::error::{Result, TrackError};
use geotrack_core::models::{
    BookingId, BoundingBox, GeoPoint, Geofence, GeofenceId, GeofenceType, LocationEvent,
    LocationReport, PairKey, Region, WorkerId,
};
use geotrack_geo::RegionResolver;
use geotrack_store::ports::{EventSink, GeofenceStore, LocationStore};

use crate::geofence::GeofenceEngine;
use crate::stream::{LocationStreamProcessor, StreamConfig};

pub struct TrackingService {
    engine: Arc<GeofenceEngine>,
    processor: LocationStreamProcessor,
    geofences: Arc<dyn GeofenceStore>,
    resolver: Option<RegionResolver>,
    outer_bounds: Option<BoundingBox>,
    default_radius_meters: f64,
}

impl TrackingService {
    pub fn new(
        config: &LayeredConfig,
        geofences: Arc<dyn GeofenceStore>,
        locations: Arc<dyn LocationStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let engine = Arc::new(GeofenceEngine::new());
        let processor = LocationStreamProcessor::new(
            engine.clone(),
            locations,
            sink,
            StreamConfig::from_config(config),
        );

        Self {
            engine,
            processor,
            geofences,
            resolver: None,
            outer_bounds: config.outer_bounds.value,
            default_radius_meters: config.default_radius_meters.value,
        }
    }

    /// Attach a district resolver. A configured outer bound replaces the dataset extent.
    pub fn with_regions(mut self, resolver: RegionResolver) -> Self {
        self.resolver = Some(match self.outer_bounds {
            Some(bounds) => resolver.with_outer_bounds(bounds),
            None => resolver,
        });
        self
    }

    pub fn engine(&self) -> &Arc<GeofenceEngine> {
        &self.engine
    }

    /// Reload active geofences from the store, returning how many were registered
    pub async fn restore(&self) -> Result<usize> {
        let active = self.geofences.load_active().await?;
        let mut restored = 0;

        for geofence in active {
            match self.engine.add_geofence(geofence) {
                Ok(_) => restored += 1,
                Err(TrackError::DuplicateGeofence { id }) => {
                    tracing::debug!(geofence_id = %id, "Geofence already registered");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(count = restored, "Restored active geofences");
        Ok(restored)
    }

    /// Geofence around `center` with the configured default radius
    pub fn geofence_at(
        &self,
        booking_id: BookingId,
        center: GeoPoint,
        geofence_type: GeofenceType,
    ) -> Geofence {
        Geofence::new(booking_id, center, self.default_radius_meters, geofence_type)
    }

    /// Register and persist a geofence, returning it as stored
    pub async fn add_geofence(&self, geofence: Geofence) -> Result<Geofence> {
        let registered = self.engine.add_geofence(geofence)?;

        if let Err(e) = self.geofences.save_geofence(&registered).await {
            // Undo the registration so engine and store agree
            self.engine.remove_geofence(registered.id)?;
            return Err(e);
        }
        Ok(registered)
    }

    /// Deactivate and persist
    pub async fn remove_geofence(&self, id: GeofenceId) -> Result<()> {
        self.engine.remove_geofence(id)?;

        if let Err(e) = self.geofences.deactivate_geofence(id).await {
            // The store still lists it as active, so keep serving it
            self.engine.reactivate_geofence(id)?;
            return Err(e);
        }
        Ok(())
    }

    /// Deactivate every geofence of a finished or cancelled booking
    pub async fn deactivate_booking(&self, booking_id: BookingId) -> Result<usize> {
        let deactivated = self.engine.deactivate_booking(booking_id);
        for id in &deactivated {
            self.geofences.deactivate_geofence(*id).await?;
        }
        Ok(deactivated.len())
    }

    pub async fn ingest(&self, report: &LocationReport) -> Result<Vec<LocationEvent>> {
        self.processor.ingest(report).await
    }

    /// Emit `work_completed` and retire the booking's geofences
    pub async fn complete_work(
        &self,
        booking_id: BookingId,
        worker_id: WorkerId,
        point: GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<LocationEvent> {
        let event = self.processor.complete_work(booking_id, worker_id, point, timestamp).await?;
        self.deactivate_booking(booking_id).await?;
        Ok(event)
    }

    pub async fn is_inside(&self, key: PairKey, id: GeofenceId) -> bool {
        self.engine.is_inside(key, id).await
    }

    pub async fn last_known(
        &self,
        booking_id: BookingId,
        worker_id: WorkerId,
    ) -> Result<Option<LocationReport>> {
        self.processor.last_known(booking_id, worker_id).await
    }

    pub async fn last_known_for_booking(&self, booking_id: BookingId) -> Result<Vec<LocationReport>> {
        self.processor.last_known_for_booking(booking_id).await
    }

    /// Resolve a point to a district; `None` without a dataset or outside the outer bound
    pub fn resolve_region(&self, point: &GeoPoint) -> Option<&Region> {
        self.resolver.as_ref()?.resolve(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geotrack_core::config::{CliConfigOverrides, LayeredConfig};
    use std::sync::atomic::{AtomicBool, Ordering};
    use geotrack_geo::RegionSet;
    use geotrack_store::memory::{MemoryEventLog, MemoryGeofenceStore, MemoryLocationStore};

    const SALEM: GeoPoint = GeoPoint::new(11.6643, 78.1460);

    fn service_with(config: &LayeredConfig) -> (TrackingService, MemoryGeofenceStore) {
        let store = MemoryGeofenceStore::new();
        let service = TrackingService::new(
            config,
            Arc::new(store.clone()),
            Arc::new(MemoryLocationStore::new()),
            Arc::new(MemoryEventLog::new()),
        );
        (service, store)
    }

    #[tokio::test]
    async fn test_add_and_remove_persist() {
        let (service, store) = service_with(&LayeredConfig::with_defaults());
        let geofence = service.geofence_at(BookingId(1), SALEM, GeofenceType::ClientLocation);
        assert_eq!(geofence.radius_meters, 200.0);

        service.add_geofence(geofence.clone()).await.unwrap();
        assert_eq!(store.load_active().await.unwrap(), vec![geofence.clone()]);

        service.remove_geofence(geofence.id).await.unwrap();
        assert!(store.load_active().await.unwrap().is_empty());
        assert!(service.engine().active_geofences(BookingId(1)).is_empty());
    }

    /// Geofence store whose writes fail while its switch is on
    #[derive(Default)]
    struct FlakyGeofenceStore {
        failing: AtomicBool,
        inner: MemoryGeofenceStore,
    }

    impl FlakyGeofenceStore {
        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(TrackError::storage("geofence store unavailable"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl GeofenceStore for FlakyGeofenceStore {
        async fn save_geofence(&self, geofence: &Geofence) -> Result<()> {
            self.check()?;
            self.inner.save_geofence(geofence).await
        }

        async fn deactivate_geofence(&self, id: GeofenceId) -> Result<()> {
            self.check()?;
            self.inner.deactivate_geofence(id).await
        }

        async fn get_geofence(&self, id: GeofenceId) -> Result<Option<Geofence>> {
            self.inner.get_geofence(id).await
        }

        async fn load_active(&self) -> Result<Vec<Geofence>> {
            self.inner.load_active().await
        }
    }

    fn flaky_service() -> (TrackingService, Arc<FlakyGeofenceStore>) {
        let store = Arc::new(FlakyGeofenceStore::default());
        let service = TrackingService::new(
            &LayeredConfig::with_defaults(),
            store.clone(),
            Arc::new(MemoryLocationStore::new()),
            Arc::new(MemoryEventLog::new()),
        );
        (service, store)
    }

    #[tokio::test]
    async fn test_inactive_input_is_stored_active() {
        let (service, store) = service_with(&LayeredConfig::with_defaults());
        let mut geofence = Geofence::new(BookingId(5), SALEM, 300.0, GeofenceType::ServiceArea);
        geofence.active = false;

        let stored = service.add_geofence(geofence).await.unwrap();
        assert!(stored.active);
        assert_eq!(store.load_active().await.unwrap(), vec![stored.clone()]);

        // A restarted service sees the same geofence
        let restarted = TrackingService::new(
            &LayeredConfig::with_defaults(),
            Arc::new(store),
            Arc::new(MemoryLocationStore::new()),
            Arc::new(MemoryEventLog::new()),
        );
        assert_eq!(restarted.restore().await.unwrap(), 1);
        assert_eq!(restarted.engine().active_geofences(BookingId(5)), vec![stored]);
    }

    #[tokio::test]
    async fn test_failed_save_unregisters() {
        let (service, store) = flaky_service();
        store.failing.store(true, Ordering::SeqCst);

        let geofence = Geofence::new(BookingId(6), SALEM, 300.0, GeofenceType::ServiceArea);
        assert!(service.add_geofence(geofence).await.is_err());
        assert!(service.engine().active_geofences(BookingId(6)).is_empty());
    }

    #[tokio::test]
    async fn test_failed_remove_keeps_geofence_active() {
        let (service, store) = flaky_service();
        let geofence = service
            .add_geofence(Geofence::new(BookingId(7), SALEM, 300.0, GeofenceType::ServiceArea))
            .await
            .unwrap();

        store.failing.store(true, Ordering::SeqCst);
        let err = service.remove_geofence(geofence.id).await.unwrap_err();
        assert!(matches!(err, TrackError::Storage { .. }));
        assert_eq!(service.engine().active_geofences(BookingId(7)), vec![geofence.clone()]);
        assert_eq!(store.load_active().await.unwrap(), vec![geofence.clone()]);

        store.failing.store(false, Ordering::SeqCst);
        service.remove_geofence(geofence.id).await.unwrap();
        assert!(service.engine().active_geofences(BookingId(7)).is_empty());
        assert!(store.load_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let (service, store) = service_with(&LayeredConfig::with_defaults());
        let geofence = Geofence::new(BookingId(2), SALEM, 500.0, GeofenceType::ServiceArea);
        store.save_geofence(&geofence).await.unwrap();

        assert_eq!(service.restore().await.unwrap(), 1);
        assert_eq!(service.restore().await.unwrap(), 0);
        assert_eq!(service.engine().active_geofences(BookingId(2)), vec![geofence]);
    }

    #[tokio::test]
    async fn test_complete_work_deactivates_booking() {
        let (service, store) = service_with(&LayeredConfig::with_defaults());
        service
            .add_geofence(service.geofence_at(BookingId(3), SALEM, GeofenceType::ClientLocation))
            .await
            .unwrap();

        let event = service.complete_work(BookingId(3), WorkerId(1), SALEM, Utc::now()).await.unwrap();
        assert_eq!(event.event_type, geotrack_core::models::LocationEventType::WorkCompleted);
        assert!(store.load_active().await.unwrap().is_empty());
        assert!(service.engine().active_geofences(BookingId(3)).is_empty());
    }

    #[tokio::test]
    async fn test_completed_bookings_release_pair_state() {
        let (service, _) = service_with(&LayeredConfig::with_defaults());
        let start = Utc::now();

        for booking in 1..=200 {
            let booking = BookingId(booking);
            service
                .add_geofence(service.geofence_at(booking, SALEM, GeofenceType::ClientLocation))
                .await
                .unwrap();
            service.ingest(&LocationReport::new(booking, WorkerId(1), SALEM, start)).await.unwrap();
            service.complete_work(booking, WorkerId(1), SALEM, start).await.unwrap();
        }

        assert_eq!(service.engine().tracked_pairs(), 0);
    }

    #[tokio::test]
    async fn test_resolve_region_uses_configured_outer_bound() {
        let regions = RegionSet::from_regions(vec![Region::new(
            "Salem",
            BoundingBox::new(11.20, 12.10, 77.60, 78.60),
            SALEM,
        )])
        .unwrap();

        let (plain, _) = service_with(&LayeredConfig::with_defaults());
        assert!(plain.resolve_region(&SALEM).is_none());
        let plain = plain.with_regions(RegionResolver::new(regions.clone()));
        assert_eq!(plain.resolve_region(&SALEM).unwrap().name, "Salem");
        assert!(plain.resolve_region(&GeoPoint::new(12.50, 78.0)).is_none());

        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            outer_bounds: Some(BoundingBox::new(8.0, 13.6, 76.2, 80.4)),
            ..Default::default()
        });
        let (bounded, _) = service_with(&config);
        let bounded = bounded.with_regions(RegionResolver::new(regions));
        // Outside the district box but inside the state, so it falls back to Salem
        assert_eq!(bounded.resolve_region(&GeoPoint::new(12.50, 78.0)).unwrap().name, "Salem");
    }
}
