//! JSON-file geofence store
//!
//! Keeps every geofence in memory and rewrites the whole file on each change.
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a crash never leaves a half-written file behind.

use async_trait::async_trait;
use geotrack_core::error::{Result, TrackError};
use geotrack_core::models::{Geofence, GeofenceId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::ports::GeofenceStore;

#[derive(Debug)]
pub struct JsonFileGeofenceStore {
    path: PathBuf,
    geofences: Mutex<BTreeMap<GeofenceId, Geofence>>,
}

impl JsonFileGeofenceStore {
    /// Open a store, reading the file if it exists
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let geofences = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                let list: Vec<Geofence> = serde_json::from_str(&content).map_err(|e| {
                    TrackError::Serialization(format!("{}: {}", path.display(), e))
                })?;
                list.into_iter().map(|g| (g.id, g)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), geofences = geofences.len(), "Opened geofence file");
        Ok(Self { path, geofences: Mutex::new(geofences) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored geofence, active or not, ordered by id
    pub async fn all(&self) -> Vec<Geofence> {
        self.geofences.lock().await.values().cloned().collect()
    }

    async fn flush(&self, geofences: &BTreeMap<GeofenceId, Geofence>) -> Result<()> {
        let list: Vec<&Geofence> = geofences.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl GeofenceStore for JsonFileGeofenceStore {
    async fn save_geofence(&self, geofence: &Geofence) -> Result<()> {
        let mut geofences = self.geofences.lock().await;
        let previous = geofences.insert(geofence.id, geofence.clone());

        if let Err(e) = self.flush(&geofences).await {
            // Keep memory consistent with disk
            match previous {
                Some(old) => geofences.insert(geofence.id, old),
                None => geofences.remove(&geofence.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn deactivate_geofence(&self, id: GeofenceId) -> Result<()> {
        let mut geofences = self.geofences.lock().await;
        let Some(geofence) = geofences.get_mut(&id) else {
            return Ok(());
        };
        if !geofence.active {
            return Ok(());
        }
        geofence.active = false;

        if let Err(e) = self.flush(&geofences).await {
            if let Some(geofence) = geofences.get_mut(&id) {
                geofence.active = true;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn get_geofence(&self, id: GeofenceId) -> Result<Option<Geofence>> {
        Ok(self.geofences.lock().await.get(&id).cloned())
    }

    async fn load_active(&self) -> Result<Vec<Geofence>> {
        let geofences = self.geofences.lock().await;
        Ok(geofences.values().filter(|g| g.active).cloned().collect())
    }
}
