//! Reading recorded location reports from disk

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use geotrack_core::models::{BookingId, GeoPoint, LocationReport, WorkerId};
use gpx::Waypoint;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Supported recording formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One JSON `LocationReport` per line
    JsonLines,
    /// GPX track points; ids come from the command line
    Gpx,
}

impl ReportFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jsonl" | "ndjson" | "json" => Ok(ReportFormat::JsonLines),
            "gpx" => Ok(ReportFormat::Gpx),
            other => bail!(
                "Unsupported report file extension '{}'. Use .jsonl or .gpx",
                other
            ),
        }
    }
}

/// Load reports, applying the optional booking/worker override
pub fn read_reports(
    path: &Path,
    booking: Option<BookingId>,
    worker: Option<WorkerId>,
) -> Result<Vec<LocationReport>> {
    let mut reports = match ReportFormat::detect(path)? {
        ReportFormat::JsonLines => read_json_lines(path)?,
        ReportFormat::Gpx => {
            let (Some(booking), Some(worker)) = (booking, worker) else {
                bail!("GPX recordings carry no ids; pass --booking and --worker");
            };
            read_gpx(path, booking, worker)?
        }
    };

    for report in &mut reports {
        if let Some(booking) = booking {
            report.booking_id = booking;
        }
        if let Some(worker) = worker {
            report.worker_id = worker;
        }
    }
    Ok(reports)
}

fn read_json_lines(path: &Path) -> Result<Vec<LocationReport>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid location report", path.display(), i + 1))
        })
        .collect()
}

fn read_gpx(path: &Path, booking: BookingId, worker: WorkerId) -> Result<Vec<LocationReport>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let gpx = gpx::read(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("Failed to parse GPX {}: {}", path.display(), e))?;

    let track_points: Vec<&Waypoint> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .collect();
    let points = if track_points.is_empty() {
        gpx.waypoints.iter().collect()
    } else {
        track_points
    };

    let mut reports = Vec::with_capacity(points.len());
    let mut untimed = 0;
    for waypoint in points {
        let Some(timestamp) = waypoint_time(waypoint) else {
            untimed += 1;
            continue;
        };
        let point = GeoPoint::new(waypoint.point().y(), waypoint.point().x());
        let mut report = LocationReport::new(booking, worker, point, timestamp);
        report.speed = waypoint.speed;
        reports.push(report);
    }

    if untimed > 0 {
        tracing::warn!(path = %path.display(), skipped = untimed, "Skipped GPX points without a time");
    }
    Ok(reports)
}

fn waypoint_time(waypoint: &Waypoint) -> Option<DateTime<Utc>> {
    let formatted = waypoint.time?.format().ok()?;
    DateTime::parse_from_rfc3339(&formatted).ok().map(|t| t.with_timezone(&Utc))
}
