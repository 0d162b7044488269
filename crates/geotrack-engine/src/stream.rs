//! Location stream processing
//!
//! Each report goes through validation, the ordering check, the outlier
//! filter and geofence evaluation while its pair lock is held. The new pair
//! state is only committed once the last known location and the emitted
//! events have both been persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geotrack_core::config::LayeredConfig;
use geotrack_core::error::Result;
use geotrack_core::models::{
    BookingId, GeoPoint, LocationEvent, LocationEventType, LocationReport, PairKey, WorkerId,
};
use geotrack_geo::{validate_point, validate_report};
use geotrack_store::ports::{EventSink, LocationStore};

use crate::filter::OutlierFilter;
use crate::geofence::{log_events, GeofenceEngine};

/// Tunables of the outlier policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    pub max_speed_mps: f64,
    pub max_accuracy_meters: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let filter = OutlierFilter::default();
        Self { max_speed_mps: filter.max_speed_mps, max_accuracy_meters: filter.max_accuracy_meters }
    }
}

impl StreamConfig {
    pub fn from_config(config: &LayeredConfig) -> Self {
        Self {
            max_speed_mps: config.max_speed_mps.value,
            max_accuracy_meters: config.max_accuracy_meters.value,
        }
    }
}

/// Turns raw device reports into location events
pub struct LocationStreamProcessor {
    engine: Arc<GeofenceEngine>,
    locations: Arc<dyn LocationStore>,
    sink: Arc<dyn EventSink>,
    filter: OutlierFilter,
}

impl LocationStreamProcessor {
    pub fn new(
        engine: Arc<GeofenceEngine>,
        locations: Arc<dyn LocationStore>,
        sink: Arc<dyn EventSink>,
        config: StreamConfig,
    ) -> Self {
        Self {
            engine,
            locations,
            sink,
            filter: OutlierFilter::new(config.max_speed_mps, config.max_accuracy_meters),
        }
    }

    pub fn engine(&self) -> &Arc<GeofenceEngine> {
        &self.engine
    }

    /// Process one report and return the events it produced.
    ///
    /// Invalid reports fail with a validation error. Stale reports and
    /// outliers are dropped with a warning and produce no events.
    pub async fn ingest(&self, report: &LocationReport) -> Result<Vec<LocationEvent>> {
        validate_report(report).into_result()?;

        let mut state = self.engine.lock_pair(report.key()).await;

        if let Err(e) = self.engine.check_order(&state, report) {
            if e.is_stale() {
                tracing::warn!(
                    booking_id = %report.booking_id,
                    worker_id = %report.worker_id,
                    "Dropping stale report: {}",
                    e
                );
                return Ok(Vec::new());
            }
            return Err(e);
        }

        if let Some(rejection) = self.filter.check(&state, report) {
            tracing::warn!(
                booking_id = %report.booking_id,
                worker_id = %report.worker_id,
                point = %report.point,
                "Dropping outlier report: {}",
                rejection
            );
            return Ok(Vec::new());
        }

        let evaluation = self.engine.evaluate(&state, report)?;
        self.persist(report, &evaluation.events).await?;

        *state = evaluation.next;
        tracing::debug!(
            booking_id = %report.booking_id,
            worker_id = %report.worker_id,
            point = %report.point,
            events = evaluation.events.len(),
            "Accepted report"
        );
        log_events(&evaluation.events);
        Ok(evaluation.events)
    }

    /// Record that a worker finished the job at `point`.
    ///
    /// Goes through the pair lock and ordering check like any report, so a
    /// completion older than the last accepted report fails as stale.
    pub async fn complete_work(
        &self,
        booking_id: BookingId,
        worker_id: WorkerId,
        point: GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<LocationEvent> {
        validate_point(&point)?;
        let report = LocationReport::new(booking_id, worker_id, point, timestamp);

        let mut state = self.engine.lock_pair(report.key()).await;
        self.engine.check_order(&state, &report)?;

        let event =
            LocationEvent::new(LocationEventType::WorkCompleted, booking_id, worker_id, point, timestamp);
        self.persist(&report, std::slice::from_ref(&event)).await?;

        state.last_accepted = Some(timestamp);
        state.last_point = Some(point);

        log_events(std::slice::from_ref(&event));
        Ok(event)
    }

    /// Last accepted report of one pair
    pub async fn last_known(
        &self,
        booking_id: BookingId,
        worker_id: WorkerId,
    ) -> Result<Option<LocationReport>> {
        self.locations.last_known(PairKey::new(booking_id, worker_id)).await
    }

    /// Last accepted report of every worker on a booking
    pub async fn last_known_for_booking(&self, booking_id: BookingId) -> Result<Vec<LocationReport>> {
        self.locations.last_known_for_booking(booking_id).await
    }

    /// Write the last known location and publish events as one unit
    async fn persist(&self, report: &LocationReport, events: &[LocationEvent]) -> Result<()> {
        let tx = self.locations.begin_transaction(report.key()).await?;

        let outcome: Result<()> = async {
            self.locations.record_last_known(report).await?;
            if !events.is_empty() {
                self.sink.publish(events).await?;
            }
            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => tx.commit().await,
            Err(e) => {
                tracing::error!(
                    booking_id = %report.booking_id,
                    worker_id = %report.worker_id,
                    "Persisting report failed, rolling back: {}",
                    e
                );
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
