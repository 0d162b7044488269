//! Resolve command implementation

use crate::cli::ResolveArgs;
use crate::output::OutputWriter;
use crate::output_types::ResolveOutput;
use anyhow::{bail, Context, Result};
use geotrack_core::config::LayeredConfig;
use geotrack_core::models::GeoPoint;
use geotrack_geo::{is_valid_point, RegionResolver, RegionSet};

pub fn execute(args: ResolveArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let point = GeoPoint::new(args.latitude, args.longitude);
    if !is_valid_point(&point) {
        bail!("Invalid coordinate {}: latitude must be in [-90, 90], longitude in [-180, 180]", point);
    }

    let regions = RegionSet::load(&args.regions)
        .with_context(|| format!("Failed to load regions from {}", args.regions.display()))?;

    let mut resolver = RegionResolver::new(regions);
    if let Some(bounds) = config.outer_bounds.value {
        resolver = resolver.with_outer_bounds(bounds);
    }

    let region = resolver.resolve(&point).cloned();

    if output.is_json() {
        return output.result(ResolveOutput {
            point,
            outer_bounds: *resolver.outer_bounds(),
            region,
        });
    }

    match region {
        Some(region) => {
            output.success(format!("{} resolves to {}", point, region.name));
            output.kv("Bounding Box", region.bounding_box);
            output.kv("Center", region.center_point);
            let inside = region.contains(&point);
            output.kv("Match", if inside { "inside district box" } else { "nearest district center" });
        }
        None => {
            output.info(format!(
                "{} is outside the outer bound {}; no district",
                point,
                resolver.outer_bounds()
            ));
        }
    }
    Ok(())
}
