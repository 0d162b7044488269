//! Coordinate to district resolution
//!
//! Resolution works in three steps:
//! 1. points outside the outer bound resolve to nothing,
//! 2. among districts whose box contains the point, the one with the nearest
//!    center wins,
//! 3. if no box contains the point, the district with the nearest center
//!    overall wins.
//!
//! Distances are haversine. Ties go to the district listed first.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use geotrack_core::error::{Result, TrackError};
use geotrack_core::models::{BoundingBox, GeoPoint, Region};
use rstar::{RTree, RTreeObject, AABB};

use crate::distance::distance_meters;

/// A validated, read-only district dataset
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    /// Validate a dataset. Fails on the first malformed entry.
    pub fn from_regions(regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            return Err(TrackError::RegionData { reason: "dataset is empty".to_string() });
        }

        let mut names = HashSet::new();
        for (i, region) in regions.iter().enumerate() {
            if region.name.trim().is_empty() {
                return Err(TrackError::RegionData {
                    reason: format!("region[{}] has an empty name", i),
                });
            }
            if !names.insert(region.name.as_str()) {
                return Err(TrackError::RegionData {
                    reason: format!("duplicate region name '{}'", region.name),
                });
            }
            region.bounding_box.validate().map_err(|e| TrackError::RegionData {
                reason: format!("region '{}': {}", region.name, e),
            })?;
            if !region.center_point.is_valid() {
                return Err(TrackError::RegionData {
                    reason: format!(
                        "region '{}' has an invalid center {}",
                        region.name, region.center_point
                    ),
                });
            }
        }

        Ok(Self { regions })
    }

    /// Parse a JSON array of regions
    pub fn from_json(json: &str) -> Result<Self> {
        let regions: Vec<Region> = serde_json::from_str(json)
            .map_err(|e| TrackError::RegionData { reason: format!("invalid JSON: {}", e) })?;
        Self::from_regions(regions)
    }

    /// Load a JSON region file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let set = Self::from_json(&content)?;
        tracing::info!(
            path = %path.as_ref().display(),
            regions = set.len(),
            "Loaded region dataset"
        );
        Ok(set)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Smallest box covering every district
    pub fn extent(&self) -> BoundingBox {
        let first = self.regions[0].bounding_box;
        self.regions.iter().skip(1).fold(first, |acc, r| acc.union(&r.bounding_box))
    }
}

/// Bounding box of one district, keyed by its position in the dataset
#[derive(Debug, Clone, PartialEq)]
struct RegionEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn to_aabb(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.lng_min, bbox.lat_min], [bbox.lng_max, bbox.lat_max])
}

/// District resolver backed by an R-tree over the district boxes
#[derive(Debug)]
pub struct RegionResolver {
    regions: Vec<Region>,
    outer_bounds: BoundingBox,
    tree: RTree<RegionEnvelope>,
}

impl RegionResolver {
    /// Build a resolver whose outer bound is the extent of the dataset
    pub fn new(set: RegionSet) -> Self {
        let outer_bounds = set.extent();
        let envelopes = set
            .regions
            .iter()
            .enumerate()
            .map(|(index, region)| RegionEnvelope { index, envelope: to_aabb(&region.bounding_box) })
            .collect();

        Self { regions: set.regions, outer_bounds, tree: RTree::bulk_load(envelopes) }
    }

    /// Replace the outer bound, e.g. with a country or state extent
    pub fn with_outer_bounds(mut self, outer_bounds: BoundingBox) -> Self {
        self.outer_bounds = outer_bounds;
        self
    }

    pub fn outer_bounds(&self) -> &BoundingBox {
        &self.outer_bounds
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Resolve a point to a district
    pub fn resolve(&self, point: &GeoPoint) -> Option<&Region> {
        if !point.is_valid() || !self.outer_bounds.contains(point) {
            return None;
        }

        let query = AABB::from_point([point.longitude, point.latitude]);
        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.index)
            .filter(|&index| self.regions[index].contains(point))
            .collect();
        // R-tree order is arbitrary; restore dataset order for the tie-break
        candidates.sort_unstable();

        let resolved = if candidates.is_empty() {
            nearest_center(point, self.regions.iter())
        } else {
            nearest_center(point, candidates.into_iter().map(|i| &self.regions[i]))
        };

        if let Some(region) = resolved {
            tracing::debug!(point = %point, region = %region.name, "Resolved region");
        }
        resolved
    }
}

/// Linear-scan resolution over a borrowed dataset.
///
/// Produces the same answer as [`RegionResolver::resolve`]; useful for one-off
/// lookups where building an index is not worth it.
pub fn resolve_region<'a>(
    point: &GeoPoint,
    regions: &'a [Region],
    outer_bounds: &BoundingBox,
) -> Option<&'a Region> {
    if !point.is_valid() || !outer_bounds.contains(point) {
        return None;
    }

    let mut containing = regions.iter().filter(|r| r.contains(point)).peekable();
    if containing.peek().is_some() {
        nearest_center(point, containing)
    } else {
        nearest_center(point, regions.iter())
    }
}

/// First region with the strictly smallest center distance
fn nearest_center<'a>(
    point: &GeoPoint,
    regions: impl Iterator<Item = &'a Region>,
) -> Option<&'a Region> {
    let mut best: Option<(&Region, f64)> = None;
    for region in regions {
        let distance = distance_meters(point, &region.center_point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((region, distance)),
        }
    }
    best.map(|(region, _)| region)
}
