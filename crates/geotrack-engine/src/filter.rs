//! Outlier rejection for raw GPS fixes

use std::fmt;

use geotrack_core::config::{DEFAULT_MAX_ACCURACY_METERS, DEFAULT_MAX_SPEED_MPS};
use geotrack_core::models::LocationReport;
use geotrack_geo::{distance_meters, implied_speed_mps};

use crate::state::PairState;

/// Why a report was dropped as noise
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// The device reported an accuracy radius above the limit
    LowAccuracy { accuracy: f64, limit: f64 },
    /// Reaching this point from the last accepted one needs an implausible speed
    ImplausibleSpeed { speed: f64, limit: f64 },
    /// A different position was reported with no time elapsed since the last fix
    InstantJump { distance: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::LowAccuracy { accuracy, limit } => {
                write!(f, "accuracy {:.1} m exceeds limit {:.1} m", accuracy, limit)
            }
            Rejection::ImplausibleSpeed { speed, limit } => {
                write!(f, "implied speed {:.1} m/s exceeds limit {:.1} m/s", speed, limit)
            }
            Rejection::InstantJump { distance } => {
                write!(f, "moved {:.1} m with no elapsed time", distance)
            }
        }
    }
}

/// Drops fixes that are too imprecise or imply teleporting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFilter {
    pub max_speed_mps: f64,
    pub max_accuracy_meters: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self { max_speed_mps: DEFAULT_MAX_SPEED_MPS, max_accuracy_meters: DEFAULT_MAX_ACCURACY_METERS }
    }
}

impl OutlierFilter {
    pub fn new(max_speed_mps: f64, max_accuracy_meters: f64) -> Self {
        Self { max_speed_mps, max_accuracy_meters }
    }

    /// Check a report against the last accepted fix of its pair.
    ///
    /// The first report of a pair is never speed-rejected. A report with the
    /// same timestamp as the last fix passes only if it repeats its position.
    pub fn check(&self, state: &PairState, report: &LocationReport) -> Option<Rejection> {
        if let Some(accuracy) = report.accuracy {
            if accuracy > self.max_accuracy_meters {
                return Some(Rejection::LowAccuracy { accuracy, limit: self.max_accuracy_meters });
            }
        }

        let (last_point, last_accepted) = state.last_point().zip(state.last_accepted())?;
        let elapsed = (report.timestamp - last_accepted).num_milliseconds() as f64 / 1000.0;
        match implied_speed_mps(&last_point, &report.point, elapsed) {
            Some(speed) => (speed > self.max_speed_mps)
                .then_some(Rejection::ImplausibleSpeed { speed, limit: self.max_speed_mps }),
            None if report.point != last_point => Some(Rejection::InstantJump {
                distance: distance_meters(&last_point, &report.point),
            }),
            None => None,
        }
    }
}
