//! Regions command implementation

use crate::cli::RegionsArgs;
use crate::output::OutputWriter;
use crate::output_types::{RegionRow, RegionsOutput};
use anyhow::{Context, Result};
use geotrack_geo::RegionSet;

pub fn execute(args: RegionsArgs, output: &OutputWriter) -> Result<()> {
    let regions = RegionSet::load(&args.regions)
        .with_context(|| format!("Invalid region dataset {}", args.regions.display()))?;

    if output.is_json() {
        return output.result(RegionsOutput {
            path: args.regions.display().to_string(),
            extent: regions.extent(),
            regions: regions.regions().to_vec(),
        });
    }

    output.success(format!("{} districts in {}", regions.len(), args.regions.display()));
    output.kv("Extent", regions.extent());
    output.section("Districts");
    output.table(regions.regions().iter().map(RegionRow::from).collect());
    Ok(())
}
