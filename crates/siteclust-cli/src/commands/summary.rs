use std::io::Write;
use std::path::Path;

use anyhow::Result;
use siteclust_algo::{capacity_by_cost_bin, DEFAULT_COST_BIN_EDGES};
use siteclust_io::{load_sites, write_cost_bin_summary};
use tabwriter::TabWriter;
use tracing::info;

use super::util::parse_edges;

pub fn handle(sites: &Path, out: &Path, edges: Option<&str>) -> Result<()> {
    let edges = match edges {
        Some(spec) => parse_edges(spec)?,
        None => DEFAULT_COST_BIN_EDGES.to_vec(),
    };
    let table = load_sites(sites)?;
    let summaries = capacity_by_cost_bin(&table, &edges)?;
    write_cost_bin_summary(&summaries, out)?;
    info!(regions = summaries.len(), "wrote {}", out.display());

    let mut tw = TabWriter::new(std::io::stdout());
    writeln!(tw, "REGION\tTOTAL_MW\tCHEAPEST_BAND\tUNBINNED_MW")?;
    for summary in &summaries {
        let cheapest = summary
            .bins
            .iter()
            .find(|bin| bin.capacity_mw > 0.0)
            .map(|bin| bin.label.as_str())
            .unwrap_or("-");
        writeln!(
            tw,
            "{}\t{:.1}\t{}\t{:.1}",
            summary.region, summary.total_mw, cheapest, summary.unbinned_mw
        )?;
    }
    tw.flush()?;
    Ok(())
}
