use crate::error::{Result, TrackError};
use crate::models::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Default implausible-speed threshold, roughly 200 km/h
pub const DEFAULT_MAX_SPEED_MPS: f64 = 55.0;

/// Fixes with a larger accuracy radius are treated as noise
pub const DEFAULT_MAX_ACCURACY_METERS: f64 = 250.0;

/// Radius used when a geofence is created without one
pub const DEFAULT_RADIUS_METERS: f64 = 200.0;

/// Layered configuration for GeoTrack
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub max_speed_mps: ConfigValue<f64>,
    pub max_accuracy_meters: ConfigValue<f64>,
    pub default_radius_meters: ConfigValue<f64>,
    pub outer_bounds: ConfigValue<Option<BoundingBox>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            max_speed_mps: ConfigValue::new(DEFAULT_MAX_SPEED_MPS, ConfigSource::Default),
            max_accuracy_meters: ConfigValue::new(
                DEFAULT_MAX_ACCURACY_METERS,
                ConfigSource::Default,
            ),
            default_radius_meters: ConfigValue::new(DEFAULT_RADIUS_METERS, ConfigSource::Default),
            outer_bounds: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| TrackError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| TrackError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(speed) = file_config.max_speed_mps {
            self.max_speed_mps.update(positive("max_speed_mps", speed)?, ConfigSource::File);
        }

        if let Some(accuracy) = file_config.max_accuracy_meters {
            self.max_accuracy_meters
                .update(positive("max_accuracy_meters", accuracy)?, ConfigSource::File);
        }

        if let Some(radius) = file_config.default_radius_meters {
            self.default_radius_meters
                .update(positive("default_radius_meters", radius)?, ConfigSource::File);
        }

        if let Some(bounds) = file_config.outer_bounds {
            bounds.validate().map_err(|e| TrackError::ConfigInvalid {
                key: "outer_bounds".to_string(),
                reason: e.to_string(),
            })?;
            self.outer_bounds.update(Some(bounds), ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // GEOTRACK_MAX_SPEED_MPS
        if let Ok(speed_str) = env::var("GEOTRACK_MAX_SPEED_MPS") {
            match parse_positive("max_speed_mps", &speed_str) {
                Ok(speed) => self.max_speed_mps.update(speed, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOTRACK_MAX_SPEED_MPS value '{}': expected a positive number",
                    speed_str
                ),
            }
        }

        // GEOTRACK_MAX_ACCURACY_M
        if let Ok(accuracy_str) = env::var("GEOTRACK_MAX_ACCURACY_M") {
            match parse_positive("max_accuracy_meters", &accuracy_str) {
                Ok(accuracy) => {
                    self.max_accuracy_meters.update(accuracy, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid GEOTRACK_MAX_ACCURACY_M value '{}': expected a positive number",
                    accuracy_str
                ),
            }
        }

        // GEOTRACK_DEFAULT_RADIUS_M
        if let Ok(radius_str) = env::var("GEOTRACK_DEFAULT_RADIUS_M") {
            match parse_positive("default_radius_meters", &radius_str) {
                Ok(radius) => self.default_radius_meters.update(radius, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOTRACK_DEFAULT_RADIUS_M value '{}': expected a positive number",
                    radius_str
                ),
            }
        }

        // GEOTRACK_OUTER_BOUNDS
        if let Ok(bounds_str) = env::var("GEOTRACK_OUTER_BOUNDS") {
            match bounds_str.parse::<BoundingBox>() {
                Ok(bounds) => self.outer_bounds.update(Some(bounds), ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOTRACK_OUTER_BOUNDS value '{}': expected latMin,latMax,lngMin,lngMax",
                    bounds_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(speed) = overrides.max_speed_mps {
            self.max_speed_mps.update(speed, ConfigSource::Cli);
        }

        if let Some(accuracy) = overrides.max_accuracy_meters {
            self.max_accuracy_meters.update(accuracy, ConfigSource::Cli);
        }

        if let Some(radius) = overrides.default_radius_meters {
            self.default_radius_meters.update(radius, ConfigSource::Cli);
        }

        if let Some(bounds) = overrides.outer_bounds {
            self.outer_bounds.update(Some(bounds), ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "max_speed_mps".to_string(),
            (format!("{} m/s", self.max_speed_mps.value), self.max_speed_mps.source),
        );

        map.insert(
            "max_accuracy_meters".to_string(),
            (format!("{} m", self.max_accuracy_meters.value), self.max_accuracy_meters.source),
        );

        map.insert(
            "default_radius_meters".to_string(),
            (format!("{} m", self.default_radius_meters.value), self.default_radius_meters.source),
        );

        let bounds = match &self.outer_bounds.value {
            Some(bbox) => bbox.to_string(),
            None => "union of region boxes".to_string(),
        };
        map.insert("outer_bounds".to_string(), (bounds, self.outer_bounds.source));

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    max_speed_mps: Option<f64>,
    max_accuracy_meters: Option<f64>,
    default_radius_meters: Option<f64>,
    outer_bounds: Option<BoundingBox>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub max_speed_mps: Option<f64>,
    pub max_accuracy_meters: Option<f64>,
    pub default_radius_meters: Option<f64>,
    pub outer_bounds: Option<BoundingBox>,
}

fn positive(key: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(TrackError::ConfigInvalid {
            key: key.to_string(),
            reason: format!("{} must be a positive number", value),
        })
    }
}

/// Parse a strictly positive number from a string
pub fn parse_positive(key: &str, s: &str) -> Result<f64> {
    let value = s.trim().parse::<f64>().map_err(|e| TrackError::ConfigInvalid {
        key: key.to_string(),
        reason: format!("'{}' is not a number: {}", s, e),
    })?;
    positive(key, value)
}
