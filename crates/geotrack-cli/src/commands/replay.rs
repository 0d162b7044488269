//! Replay command implementation

use crate::cli::ReplayArgs;
use crate::output::OutputWriter;
use crate::output_types::{EventRow, ReplayOutput};
use crate::progress::{create_progress_bar, finish_success};
use crate::reports::read_reports;
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use geotrack_core::config::LayeredConfig;
use geotrack_core::models::{BookingId, LocationEvent, LocationReport, WorkerId};
use geotrack_engine::TrackingService;
use geotrack_store::file::JsonFileGeofenceStore;
use geotrack_store::memory::{MemoryEventLog, MemoryLocationStore};
use std::collections::BTreeSet;
use std::sync::Arc;

pub async fn execute(args: ReplayArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let reports = read_reports(&args.reports, args.booking.map(BookingId), args.worker.map(WorkerId))?;

    let store = JsonFileGeofenceStore::open(&args.geofences)
        .await
        .with_context(|| format!("Failed to open geofence file {}", args.geofences.display()))?;
    let log = MemoryEventLog::new();
    let service = TrackingService::new(
        config,
        Arc::new(store),
        Arc::new(MemoryLocationStore::new()),
        Arc::new(log.clone()),
    );
    let geofences = service.restore().await?;

    let pb = create_progress_bar(
        reports.len() as u64,
        &format!("Replaying {}", args.reports.display()),
        output.is_json() || args.geojson,
    );

    let mut accepted = 0;
    let mut dropped = 0;
    let mut rejected = 0;
    for report in &reports {
        match service.ingest(report).await {
            Ok(_) => {
                let last = service.last_known(report.booking_id, report.worker_id).await?;
                if last.as_ref() == Some(report) {
                    accepted += 1;
                } else {
                    dropped += 1;
                }
            }
            Err(e) if e.is_validation() => {
                rejected += 1;
                pb.suspend(|| output.warning(format!("Rejected report at {}: {}", report.timestamp, e)));
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Replay aborted")),
        }
        pb.inc(1);
    }
    finish_success(&pb, &format!("{} reports replayed", reports.len()));

    if args.complete {
        complete_bookings(&service, &reports).await?;
    }

    let events = log.events();

    if args.geojson {
        return output.data(&to_feature_collection(&events));
    }

    if output.is_json() {
        return output.result(ReplayOutput {
            reports: reports.len(),
            accepted,
            dropped,
            rejected,
            geofences,
            events,
        });
    }

    output.section("Replay Summary");
    output.kv("Reports", reports.len());
    output.kv("Accepted", accepted);
    output.kv("Dropped (stale or outlier)", dropped);
    output.kv("Rejected (invalid)", rejected);
    output.kv("Active geofences", geofences);

    output.section("Events");
    output.table(events.iter().map(EventRow::from).collect());
    Ok(())
}

/// Complete every booking seen in the recording at each worker's last position
async fn complete_bookings(
    service: &TrackingService,
    reports: &[LocationReport],
) -> Result<()> {
    let bookings: BTreeSet<BookingId> = reports.iter().map(|r| r.booking_id).collect();

    for booking in bookings {
        for last in service.last_known_for_booking(booking).await? {
            service
                .complete_work(booking, last.worker_id, last.point, last.timestamp)
                .await
                .with_context(|| format!("Failed to complete booking {}", booking))?;
        }
    }
    Ok(())
}

fn to_feature_collection(events: &[LocationEvent]) -> FeatureCollection {
    let features = events
        .iter()
        .map(|event| {
            let mut properties = JsonObject::new();
            properties.insert("event_type".to_string(), JsonValue::from(event.event_type.as_str()));
            properties.insert("booking_id".to_string(), JsonValue::from(event.booking_id.0));
            properties.insert("worker_id".to_string(), JsonValue::from(event.worker_id.0));
            properties.insert("timestamp".to_string(), JsonValue::from(event.timestamp.to_rfc3339()));
            if let Some(geofence_id) = event.geofence_id {
                properties.insert("geofence_id".to_string(), JsonValue::from(geofence_id.to_string()));
            }
            for (key, value) in &event.metadata {
                properties.insert(key.clone(), value.clone());
            }

            let position = vec![event.point.longitude, event.point.latitude];
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::Point(position))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}
