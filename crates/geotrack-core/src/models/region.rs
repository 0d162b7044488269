use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::point::GeoPoint;
use crate::error::{Result, TrackError};

/// Axis-aligned latitude/longitude box, inclusive on every edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl BoundingBox {
    pub const fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Self {
        Self { lat_min, lat_max, lng_min, lng_max }
    }

    /// Points on a boundary line count as inside
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.lat_min
            && point.latitude <= self.lat_max
            && point.longitude >= self.lng_min
            && point.longitude <= self.lng_max
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            lat_min: self.lat_min.min(other.lat_min),
            lat_max: self.lat_max.max(other.lat_max),
            lng_min: self.lng_min.min(other.lng_min),
            lng_max: self.lng_max.max(other.lng_max),
        }
    }

    /// Check that the corners are valid points and min <= max on both axes
    pub fn validate(&self) -> Result<()> {
        let corners = [
            GeoPoint::new(self.lat_min, self.lng_min),
            GeoPoint::new(self.lat_max, self.lng_max),
        ];
        if corners.iter().any(|c| !c.is_valid()) {
            return Err(TrackError::validation(
                "bounding_box",
                format!("{} has out-of-range coordinates", self),
            ));
        }
        if self.lat_min > self.lat_max || self.lng_min > self.lng_max {
            return Err(TrackError::validation(
                "bounding_box",
                format!("{} has min greater than max", self),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.lat_min, self.lat_max, self.lng_min, self.lng_max)
    }
}

/// Parses `latMin,latMax,lngMin,lngMax`
impl FromStr for BoundingBox {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| TrackError::validation("bounding_box", format!("'{}': {}", s, e)))?;

        let &[lat_min, lat_max, lng_min, lng_max] = values.as_slice() else {
            return Err(TrackError::validation(
                "bounding_box",
                format!("expected latMin,latMax,lngMin,lngMax, got '{}'", s),
            ));
        };

        let bbox = BoundingBox::new(lat_min, lat_max, lng_min, lng_max);
        bbox.validate()?;
        Ok(bbox)
    }
}

/// A named administrative district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub name: String,
    pub bounding_box: BoundingBox,
    pub center_point: GeoPoint,
}

impl Region {
    pub fn new(name: impl Into<String>, bounding_box: BoundingBox, center_point: GeoPoint) -> Self {
        Self { name: name.into(), bounding_box, center_point }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.bounding_box.contains(point)
    }
}
