//! Geofence command implementation

use crate::cli::{GeofenceAction, GeofenceArgs};
use crate::output::OutputWriter;
use crate::output_types::{GeofenceRow, GeofencesOutput};
use anyhow::{Context, Result};
use geotrack_core::config::LayeredConfig;
use geotrack_core::models::{BookingId, GeoPoint, Geofence};
use geotrack_engine::TrackingService;
use geotrack_store::file::JsonFileGeofenceStore;
use geotrack_store::memory::{MemoryEventLog, MemoryLocationStore};
use std::sync::Arc;

pub async fn execute(args: GeofenceArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let store = Arc::new(
        JsonFileGeofenceStore::open(&args.geofences)
            .await
            .with_context(|| format!("Failed to open geofence file {}", args.geofences.display()))?,
    );

    let service = TrackingService::new(
        config,
        store.clone(),
        Arc::new(MemoryLocationStore::new()),
        Arc::new(MemoryEventLog::new()),
    );
    service.restore().await?;

    match args.action {
        GeofenceAction::Add { booking, lat, lng, radius, geofence_type } => {
            let mut geofence =
                service.geofence_at(BookingId(booking), GeoPoint::new(lat, lng), geofence_type.into());
            if let Some(radius) = radius {
                geofence.radius_meters = radius;
            }
            let geofence = service.add_geofence(geofence).await.context("Failed to add geofence")?;

            if output.is_json() {
                return output.result(&geofence);
            }
            output.success(format!("Added geofence {}", geofence.id));
            output.table(vec![GeofenceRow::from(&geofence)]);
        }
        GeofenceAction::List { all } => {
            let geofences: Vec<Geofence> =
                store.all().await.into_iter().filter(|g| all || g.active).collect();

            if output.is_json() {
                return output.result(GeofencesOutput {
                    path: args.geofences.display().to_string(),
                    geofences,
                });
            }
            output.section(format!("Geofences in {}", args.geofences.display()));
            output.table(geofences.iter().map(GeofenceRow::from).collect());
        }
        GeofenceAction::Remove { id } => {
            service.remove_geofence(id).await.context("Failed to remove geofence")?;

            if output.is_json() {
                return output.result(serde_json::json!({ "removed": id }));
            }
            output.success(format!("Deactivated geofence {}", id));
        }
    }

    Ok(())
}
