//! Geofence registry and membership evaluation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use geotrack_core::error::{Result, TrackError};
use geotrack_core::models::{
    BookingId, Geofence, GeofenceId, LocationEvent, LocationEventType, LocationReport, PairKey,
};
use geotrack_geo::{distance_meters, validate_geofence, validate_point};
use tokio::sync::OwnedMutexGuard;

use crate::state::{Membership, PairRegistry, PairState};

/// A geofence plus the registration it came from.
///
/// Re-registering an id after removal bumps the generation, which makes any
/// membership flags from the old registration read as absent.
#[derive(Debug, Clone)]
struct Registration {
    geofence: Geofence,
    generation: u64,
}

/// Outcome of evaluating one report against a pair's state.
///
/// Nothing is applied until the caller assigns `next` back into the pair state.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub events: Vec<LocationEvent>,
    pub next: PairState,
}

/// Holds the active geofences and the per-pair membership state
#[derive(Debug, Default)]
pub struct GeofenceEngine {
    geofences: RwLock<HashMap<GeofenceId, Registration>>,
    next_generation: AtomicU64,
    pairs: PairRegistry,
}

impl GeofenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geofence for its booking and return it as registered (always active).
    ///
    /// Fails with `DuplicateGeofence` while a geofence with the same id is active.
    pub fn add_geofence(&self, geofence: Geofence) -> Result<Geofence> {
        validate_geofence(&geofence).into_result()?;

        let mut geofences = self.geofences.write().unwrap_or_else(PoisonError::into_inner);
        if geofences.get(&geofence.id).is_some_and(|r| r.geofence.active) {
            return Err(TrackError::DuplicateGeofence { id: geofence.id });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut geofence = geofence;
        geofence.active = true;

        tracing::info!(
            geofence_id = %geofence.id,
            booking_id = %geofence.booking_id,
            geofence_type = %geofence.geofence_type,
            radius_meters = geofence.radius_meters,
            "Registered geofence"
        );
        geofences.insert(geofence.id, Registration { geofence: geofence.clone(), generation });
        Ok(geofence)
    }

    /// Deactivate a geofence. Later reports ignore it; past events stay as they are.
    ///
    /// Removing an already inactive geofence is a no-op.
    pub fn remove_geofence(&self, id: GeofenceId) -> Result<()> {
        let mut geofences = self.geofences.write().unwrap_or_else(PoisonError::into_inner);
        let registration =
            geofences.get_mut(&id).ok_or(TrackError::GeofenceNotFound { id })?;

        if registration.geofence.active {
            registration.geofence.active = false;
            tracing::info!(geofence_id = %id, "Deactivated geofence");
        }
        Ok(())
    }

    /// Undo a `remove_geofence` whose persistence failed.
    ///
    /// Keeps the registration's generation. A no-op if the geofence is active.
    pub fn reactivate_geofence(&self, id: GeofenceId) -> Result<()> {
        let mut geofences = self.geofences.write().unwrap_or_else(PoisonError::into_inner);
        let registration =
            geofences.get_mut(&id).ok_or(TrackError::GeofenceNotFound { id })?;

        if !registration.geofence.active {
            registration.geofence.active = true;
            tracing::warn!(geofence_id = %id, "Reactivated geofence");
        }
        Ok(())
    }

    /// Deactivate every geofence of a booking, returning the ids that changed.
    ///
    /// The booking's per-pair state is released as well.
    pub fn deactivate_booking(&self, booking_id: BookingId) -> Vec<GeofenceId> {
        let mut deactivated: Vec<GeofenceId> = {
            let mut geofences = self.geofences.write().unwrap_or_else(PoisonError::into_inner);
            geofences
                .values_mut()
                .filter(|r| r.geofence.booking_id == booking_id && r.geofence.active)
                .map(|r| {
                    r.geofence.active = false;
                    r.geofence.id
                })
                .collect()
        };
        deactivated.sort();
        let released = self.pairs.remove_booking(booking_id);

        if !deactivated.is_empty() {
            tracing::info!(
                booking_id = %booking_id,
                count = deactivated.len(),
                "Deactivated booking geofences"
            );
        }
        tracing::debug!(booking_id = %booking_id, pairs = released, "Released pair state");
        deactivated
    }

    /// Number of (booking, worker) pairs with live state
    pub fn tracked_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Look up a geofence, active or not
    pub fn geofence(&self, id: GeofenceId) -> Option<Geofence> {
        let geofences = self.geofences.read().unwrap_or_else(PoisonError::into_inner);
        geofences.get(&id).map(|r| r.geofence.clone())
    }

    /// Active geofences of a booking, ordered by id
    pub fn active_geofences(&self, booking_id: BookingId) -> Vec<Geofence> {
        self.active_registrations(booking_id).into_iter().map(|r| r.geofence).collect()
    }

    fn active_registrations(&self, booking_id: BookingId) -> Vec<Registration> {
        let geofences = self.geofences.read().unwrap_or_else(PoisonError::into_inner);
        let mut active: Vec<Registration> = geofences
            .values()
            .filter(|r| r.geofence.booking_id == booking_id && r.geofence.active)
            .cloned()
            .collect();
        active.sort_by_key(|r| r.geofence.id);
        active
    }

    /// Take the per-pair lock. Hold it across evaluate and commit.
    pub async fn lock_pair(&self, key: PairKey) -> OwnedMutexGuard<PairState> {
        self.pairs.handle(key).lock_owned().await
    }

    /// Whether the pair is currently inside a geofence
    pub async fn is_inside(&self, key: PairKey, id: GeofenceId) -> bool {
        let generation = {
            let geofences = self.geofences.read().unwrap_or_else(PoisonError::into_inner);
            match geofences.get(&id) {
                Some(r) if r.geofence.active => r.generation,
                _ => return false,
            }
        };
        self.lock_pair(key).await.is_inside(id, generation)
    }

    /// Reject reports older than the last accepted one for the pair.
    ///
    /// Equal timestamps are accepted so a resent report is harmless.
    pub fn check_order(&self, state: &PairState, report: &LocationReport) -> Result<()> {
        match state.last_accepted {
            Some(last_accepted) if report.timestamp < last_accepted => {
                Err(TrackError::StaleReport {
                    booking_id: report.booking_id,
                    worker_id: report.worker_id,
                    timestamp: report.timestamp,
                    last_accepted,
                })
            }
            _ => Ok(()),
        }
    }

    /// Compute the events a report produces and the state it leads to.
    ///
    /// Pure with respect to `state`: the caller decides whether to commit.
    pub fn evaluate(&self, state: &PairState, report: &LocationReport) -> Result<Evaluation> {
        self.check_order(state, report)?;

        let registrations = self.active_registrations(report.booking_id);
        let mut next = state.clone();
        next.last_accepted = Some(report.timestamp);
        next.last_point = Some(report.point);
        next.membership.retain(|id, m| {
            registrations.iter().any(|r| r.geofence.id == *id && r.generation == m.generation)
        });

        let mut events = Vec::new();
        for Registration { geofence, generation } in &registrations {
            let distance = distance_meters(&report.point, &geofence.center);
            let inside = distance <= geofence.radius_meters;
            let was_inside = state.is_inside(geofence.id, *generation);

            tracing::debug!(
                booking_id = %report.booking_id,
                worker_id = %report.worker_id,
                geofence_id = %geofence.id,
                distance_meters = distance,
                inside,
                "Evaluated geofence membership"
            );

            next.membership.insert(geofence.id, Membership { generation: *generation, inside });
            if inside == was_inside {
                continue;
            }

            let event_type = if inside {
                LocationEventType::GeofenceEntry
            } else {
                LocationEventType::GeofenceExit
            };
            events.push(geofence_event(event_type, report, geofence, distance));

            if inside && geofence.is_client_location() && !next.arrived {
                next.arrived = true;
                events.push(geofence_event(
                    LocationEventType::ArrivedAtClient,
                    report,
                    geofence,
                    distance,
                ));
            }
        }

        Ok(Evaluation { events, next })
    }

    /// Evaluate a report and commit the result under the pair lock.
    ///
    /// Stale reports produce no events and leave the state untouched.
    pub async fn process_report(&self, report: &LocationReport) -> Result<Vec<LocationEvent>> {
        validate_point(&report.point)?;

        let mut state = self.lock_pair(report.key()).await;
        match self.evaluate(&state, report) {
            Ok(evaluation) => {
                *state = evaluation.next;
                log_events(&evaluation.events);
                Ok(evaluation.events)
            }
            Err(e) if e.is_stale() => {
                tracing::warn!(
                    booking_id = %report.booking_id,
                    worker_id = %report.worker_id,
                    "Dropping stale report: {}",
                    e
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

fn geofence_event(
    event_type: LocationEventType,
    report: &LocationReport,
    geofence: &Geofence,
    distance: f64,
) -> LocationEvent {
    let mut event = LocationEvent::new(
        event_type,
        report.booking_id,
        report.worker_id,
        report.point,
        report.timestamp,
    )
    .geofence(geofence.id)
    .meta("distance_meters", (distance * 10.0).round() / 10.0)
    .meta("radius_meters", geofence.radius_meters)
    .meta("geofence_type", geofence.geofence_type.as_str());

    if let Some(accuracy) = report.accuracy {
        event = event.meta("accuracy_meters", accuracy);
    }
    event
}

pub(crate) fn log_events(events: &[LocationEvent]) {
    for event in events {
        tracing::info!(
            booking_id = %event.booking_id,
            worker_id = %event.worker_id,
            event_type = %event.event_type,
            geofence_id = ?event.geofence_id,
            "Location event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use geotrack_core::models::{GeoPoint, GeofenceType, WorkerId};

    const SALEM: GeoPoint = GeoPoint::new(11.6643, 78.1460);

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    /// Point `meters` due north of `origin`
    fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
        GeoPoint::new(origin.latitude + (meters / 6_371_008.8).to_degrees(), origin.longitude)
    }

    fn report(at: GeoPoint, seconds: i64) -> LocationReport {
        LocationReport::new(BookingId(1), WorkerId(7), at, t(seconds))
    }

    fn engine_with(geofence_type: GeofenceType) -> (GeofenceEngine, Geofence) {
        let engine = GeofenceEngine::new();
        let geofence = Geofence::new(BookingId(1), SALEM, 500.0, geofence_type);
        engine.add_geofence(geofence.clone()).unwrap();
        (engine, geofence)
    }

    fn types(events: &[LocationEvent]) -> Vec<LocationEventType> {
        events.iter().map(|e| e.event_type).collect()
    }

    #[tokio::test]
    async fn test_salem_approach_scenario() {
        let (engine, geofence) = engine_with(GeofenceType::ClientLocation);

        let far = engine.process_report(&report(north_of(SALEM, 600.0), 0)).await.unwrap();
        assert!(far.is_empty());

        let near = engine.process_report(&report(north_of(SALEM, 300.0), 30)).await.unwrap();
        assert_eq!(
            types(&near),
            vec![LocationEventType::GeofenceEntry, LocationEventType::ArrivedAtClient]
        );
        assert!(near.iter().all(|e| e.geofence_id == Some(geofence.id)));
        assert_eq!(near[0].metadata["geofence_type"], serde_json::json!("client_location"));
    }

    #[tokio::test]
    async fn test_service_area_entry_has_no_arrival() {
        let (engine, _) = engine_with(GeofenceType::ServiceArea);
        let events = engine.process_report(&report(SALEM, 0)).await.unwrap();
        assert_eq!(types(&events), vec![LocationEventType::GeofenceEntry]);
    }

    #[tokio::test]
    async fn test_same_report_twice_emits_once() {
        let (engine, _) = engine_with(GeofenceType::ServiceArea);
        let inside = report(SALEM, 0);

        assert_eq!(engine.process_report(&inside).await.unwrap().len(), 1);
        assert!(engine.process_report(&inside).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_then_reentry() {
        let (engine, _) = engine_with(GeofenceType::ClientLocation);

        let entry = engine.process_report(&report(SALEM, 0)).await.unwrap();
        assert_eq!(entry.len(), 2);

        let exit = engine.process_report(&report(north_of(SALEM, 900.0), 60)).await.unwrap();
        assert_eq!(types(&exit), vec![LocationEventType::GeofenceExit]);

        // Arrival is only reported for the first entry
        let reentry = engine.process_report(&report(SALEM, 120)).await.unwrap();
        assert_eq!(types(&reentry), vec![LocationEventType::GeofenceEntry]);
    }

    #[tokio::test]
    async fn test_boundary_counts_as_inside() {
        let engine = GeofenceEngine::new();
        let point = north_of(SALEM, 250.0);
        let radius = distance_meters(&point, &SALEM);
        engine
            .add_geofence(Geofence::new(BookingId(1), SALEM, radius, GeofenceType::ServiceArea))
            .unwrap();

        let events = engine.process_report(&report(point, 0)).await.unwrap();
        assert_eq!(types(&events), vec![LocationEventType::GeofenceEntry]);
    }

    #[tokio::test]
    async fn test_stale_report_is_dropped() {
        let (engine, geofence) = engine_with(GeofenceType::ServiceArea);

        engine.process_report(&report(north_of(SALEM, 800.0), 100)).await.unwrap();
        let stale = engine.process_report(&report(SALEM, 50)).await.unwrap();
        assert!(stale.is_empty());

        let key = PairKey::new(BookingId(1), WorkerId(7));
        assert!(!engine.is_inside(key, geofence.id).await);
        assert_eq!(engine.lock_pair(key).await.last_accepted(), Some(t(100)));
    }

    #[tokio::test]
    async fn test_other_bookings_are_ignored() {
        let (engine, _) = engine_with(GeofenceType::ServiceArea);
        let other = LocationReport::new(BookingId(2), WorkerId(7), SALEM, t(0));
        assert!(engine.process_report(&other).await.unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_active_geofence_rejected() {
        let (engine, geofence) = engine_with(GeofenceType::ServiceArea);
        let err = engine.add_geofence(geofence.clone()).unwrap_err();
        assert!(matches!(err, TrackError::DuplicateGeofence { id } if id == geofence.id));

        engine.remove_geofence(geofence.id).unwrap();
        assert!(engine.add_geofence(geofence).is_ok());
    }

    #[test]
    fn test_invalid_geofence_rejected() {
        let engine = GeofenceEngine::new();
        let bad = Geofence::new(BookingId(1), SALEM, -5.0, GeofenceType::ServiceArea);
        assert!(engine.add_geofence(bad).unwrap_err().is_validation());
    }

    #[test]
    fn test_remove_unknown_geofence() {
        let engine = GeofenceEngine::new();
        let err = engine.remove_geofence(GeofenceId::new()).unwrap_err();
        assert!(matches!(err, TrackError::GeofenceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_removed_geofence_is_ignored() {
        let (engine, geofence) = engine_with(GeofenceType::ServiceArea);
        engine.process_report(&report(SALEM, 0)).await.unwrap();
        engine.remove_geofence(geofence.id).unwrap();

        // Leaving after removal produces no exit
        let events = engine.process_report(&report(north_of(SALEM, 900.0), 10)).await.unwrap();
        assert!(events.is_empty());
        assert!(engine.active_geofences(BookingId(1)).is_empty());
        assert!(engine.geofence(geofence.id).is_some());
    }

    #[tokio::test]
    async fn test_reregistration_starts_clean() {
        let (engine, geofence) = engine_with(GeofenceType::ServiceArea);
        engine.process_report(&report(SALEM, 0)).await.unwrap();

        engine.remove_geofence(geofence.id).unwrap();
        engine.add_geofence(geofence.clone()).unwrap();

        // Still inside, but the new registration has not seen this worker yet
        let events = engine.process_report(&report(SALEM, 10)).await.unwrap();
        assert_eq!(types(&events), vec![LocationEventType::GeofenceEntry]);
    }

    #[tokio::test]
    async fn test_deactivate_booking() {
        let engine = GeofenceEngine::new();
        for geofence_type in [GeofenceType::ServiceArea, GeofenceType::ClientLocation] {
            engine.add_geofence(Geofence::new(BookingId(3), SALEM, 100.0, geofence_type)).unwrap();
        }
        engine
            .add_geofence(Geofence::new(BookingId(4), SALEM, 100.0, GeofenceType::ServiceArea))
            .unwrap();

        assert_eq!(engine.deactivate_booking(BookingId(3)).len(), 2);
        assert!(engine.deactivate_booking(BookingId(3)).is_empty());
        assert_eq!(engine.active_geofences(BookingId(4)).len(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_booking_releases_pair_state() {
        let (engine, _) = engine_with(GeofenceType::ClientLocation);
        for worker in 1..=3 {
            let r = LocationReport::new(BookingId(1), WorkerId(worker), SALEM, t(0));
            engine.process_report(&r).await.unwrap();
        }
        let other = LocationReport::new(BookingId(2), WorkerId(1), SALEM, t(0));
        engine.process_report(&other).await.unwrap();
        assert_eq!(engine.tracked_pairs(), 4);

        engine.deactivate_booking(BookingId(1));
        assert_eq!(engine.tracked_pairs(), 1);
        assert!(engine.lock_pair(other.key()).await.last_accepted().is_some());
    }

    #[test]
    fn test_inactive_input_is_registered_active() {
        let engine = GeofenceEngine::new();
        let mut geofence = Geofence::new(BookingId(1), SALEM, 300.0, GeofenceType::ServiceArea);
        geofence.active = false;

        let registered = engine.add_geofence(geofence.clone()).unwrap();
        assert!(registered.active);
        assert_eq!(registered.id, geofence.id);
        assert_eq!(engine.active_geofences(BookingId(1)), vec![registered]);
    }

    #[tokio::test]
    async fn test_reactivate_keeps_membership() {
        let (engine, geofence) = engine_with(GeofenceType::ServiceArea);
        engine.process_report(&report(SALEM, 0)).await.unwrap();

        engine.remove_geofence(geofence.id).unwrap();
        engine.reactivate_geofence(geofence.id).unwrap();
        engine.reactivate_geofence(geofence.id).unwrap();

        // Same registration, so the worker is still known to be inside
        assert!(engine.process_report(&report(SALEM, 10)).await.unwrap().is_empty());
        assert!(matches!(
            engine.reactivate_geofence(GeofenceId::new()).unwrap_err(),
            TrackError::GeofenceNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_evaluate_does_not_commit() {
        let (engine, _) = engine_with(GeofenceType::ServiceArea);
        let key = PairKey::new(BookingId(1), WorkerId(7));

        let state = engine.lock_pair(key).await;
        let evaluation = engine.evaluate(&state, &report(SALEM, 0)).unwrap();
        assert_eq!(evaluation.events.len(), 1);
        assert!(state.last_accepted().is_none());
        assert_eq!(evaluation.next.last_accepted(), Some(t(0)));
    }

    #[tokio::test]
    async fn test_invalid_point_is_rejected() {
        let (engine, _) = engine_with(GeofenceType::ServiceArea);
        let err = engine.process_report(&report(GeoPoint::new(120.0, 78.0), 0)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_accuracy_is_recorded_in_metadata() {
        let (engine, _) = engine_with(GeofenceType::ServiceArea);
        let events =
            engine.process_report(&report(SALEM, 0).with_accuracy(12.0)).await.unwrap();
        assert_eq!(events[0].metadata["accuracy_meters"], serde_json::json!(12.0));
        assert_eq!(events[0].metadata["distance_meters"], serde_json::json!(0.0));
    }
}
