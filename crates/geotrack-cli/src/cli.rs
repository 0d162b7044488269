use clap::{Parser, Subcommand, ValueEnum};
use geotrack_core::config::CliConfigOverrides;
use geotrack_core::models::{BoundingBox, GeofenceId, GeofenceType};
use std::path::PathBuf;

/// GeoTrack - Geofence tracking and district resolution
#[derive(Parser, Debug)]
#[command(name = "geotrack")]
#[command(about = "Geofence tracking and district resolution", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (TOML). Defaults to ./geotrack.toml when present
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the implausible-speed threshold (m/s)
    #[arg(long, global = true, value_name = "MPS")]
    pub max_speed_mps: Option<f64>,

    /// Override the accuracy limit (meters)
    #[arg(long, global = true, value_name = "METERS")]
    pub max_accuracy_meters: Option<f64>,

    /// Override the default geofence radius (meters)
    #[arg(long, global = true, value_name = "METERS")]
    pub default_radius_meters: Option<f64>,

    /// Outer bound for district resolution: latMin,latMax,lngMin,lngMax
    #[arg(long, global = true, value_name = "BOX", allow_hyphen_values = true)]
    pub outer_bounds: Option<BoundingBox>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_overrides(&self) -> CliConfigOverrides {
        CliConfigOverrides {
            max_speed_mps: self.max_speed_mps,
            max_accuracy_meters: self.max_accuracy_meters,
            default_radius_meters: self.default_radius_meters,
            outer_bounds: self.outer_bounds,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a coordinate to a district
    Resolve(ResolveArgs),

    /// Validate and list a district dataset
    Regions(RegionsArgs),

    /// Manage the geofences of a booking
    Geofence(GeofenceArgs),

    /// Feed recorded location reports through the tracking engine
    Replay(ReplayArgs),

    /// Show the effective configuration and where each value came from
    Config,
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Latitude in degrees
    #[arg(allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude in degrees
    #[arg(allow_hyphen_values = true)]
    pub longitude: f64,

    /// District dataset (JSON array of regions)
    #[arg(long, value_name = "FILE")]
    pub regions: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RegionsArgs {
    /// District dataset (JSON array of regions)
    #[arg(long, value_name = "FILE")]
    pub regions: PathBuf,
}

#[derive(Parser, Debug)]
pub struct GeofenceArgs {
    /// Geofence file (JSON array), created if missing
    #[arg(long, value_name = "FILE")]
    pub geofences: PathBuf,

    #[command(subcommand)]
    pub action: GeofenceAction,
}

#[derive(Subcommand, Debug)]
pub enum GeofenceAction {
    /// Add a circular geofence to a booking
    Add {
        /// Owning booking
        #[arg(long)]
        booking: u64,

        /// Center latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Center longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Radius in meters (defaults to the configured default radius)
        #[arg(long)]
        radius: Option<f64>,

        /// Geofence purpose
        #[arg(long = "type", value_enum, default_value = "client-location")]
        geofence_type: GeofenceKind,
    },

    /// List geofences
    List {
        /// Include deactivated geofences
        #[arg(long)]
        all: bool,
    },

    /// Deactivate a geofence
    Remove {
        /// Geofence id
        id: GeofenceId,
    },
}

/// Geofence purpose as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GeofenceKind {
    ServiceArea,
    ClientLocation,
    WorkerStartPoint,
}

impl From<GeofenceKind> for GeofenceType {
    fn from(kind: GeofenceKind) -> Self {
        match kind {
            GeofenceKind::ServiceArea => GeofenceType::ServiceArea,
            GeofenceKind::ClientLocation => GeofenceType::ClientLocation,
            GeofenceKind::WorkerStartPoint => GeofenceType::WorkerStartPoint,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Recorded reports: JSON lines (.jsonl) or a GPX track (.gpx)
    #[arg(long, value_name = "FILE")]
    pub reports: PathBuf,

    /// Geofence file (JSON array) to load active geofences from
    #[arg(long, value_name = "FILE")]
    pub geofences: PathBuf,

    /// Booking id; required for GPX, overrides JSON lines
    #[arg(long)]
    pub booking: Option<u64>,

    /// Worker id; required for GPX, overrides JSON lines
    #[arg(long)]
    pub worker: Option<u64>,

    /// Mark the work completed at the last accepted position and
    /// deactivate the booking's geofences in the geofence file
    #[arg(long)]
    pub complete: bool,

    /// Print the events as a GeoJSON FeatureCollection
    #[arg(long)]
    pub geojson: bool,
}
