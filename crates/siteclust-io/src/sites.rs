use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use polars::prelude::*;
use siteclust_core::{canonical_name, SiteRecord, SiteTable, CAPACITY_COL, COST_COL};
use tracing::info;

use crate::{column_f64, column_text, read_frame};

fn find_column<'a>(df: &'a DataFrame, canonical: &str) -> Option<&'a Series> {
    df.get_columns()
        .iter()
        .find(|s| canonical_name(s.name()) == canonical)
}

fn required_column<'a>(df: &'a DataFrame, canonical: &str, path: &Path) -> Result<&'a Series> {
    find_column(df, canonical).ok_or_else(|| {
        anyhow!(
            "site table {} has no '{}' column",
            path.display(),
            canonical
        )
    })
}

/// Load a site table.
///
/// Required columns are `site_id` (or `cpa_id`), `region` (or `ipm_region`)
/// and `capacity_mw` (or `mw`); `cost` (or `lcoe`) is optional. Every other
/// numeric column becomes a feature and every other column a text attribute,
/// both keyed by lower-case name.
pub fn load_sites(path: &Path) -> Result<SiteTable> {
    let df = read_frame(path)?;
    let ids = column_text(required_column(&df, "site_id", path)?)?;
    let regions = column_text(required_column(&df, "region", path)?)?;
    let capacity = column_f64(required_column(&df, CAPACITY_COL, path)?)?;
    let cost = match find_column(&df, COST_COL) {
        Some(series) => column_f64(series)?,
        None => vec![None; df.height()],
    };

    let mut records = Vec::with_capacity(df.height());
    let mut seen = HashSet::with_capacity(df.height());
    for row in 0..df.height() {
        let Some(site_id) = ids[row].clone() else {
            bail!("row {} of {} has no site id", row + 1, path.display());
        };
        if !seen.insert(site_id.clone()) {
            bail!("duplicate site id '{}' in {}", site_id, path.display());
        }
        let region = regions[row]
            .clone()
            .ok_or_else(|| anyhow!("site '{}' has no region", site_id))?;
        let capacity_mw = capacity[row]
            .ok_or_else(|| anyhow!("site '{}' has no capacity", site_id))?;
        let mut record = SiteRecord::new(site_id, region, capacity_mw);
        record.cost = cost[row];
        records.push(record);
    }

    let builtin = ["site_id", "region", CAPACITY_COL, COST_COL];
    for series in df.get_columns() {
        let name = canonical_name(series.name());
        if builtin.contains(&name.as_str()) {
            continue;
        }
        if series.dtype().is_numeric() {
            for (record, value) in records.iter_mut().zip(column_f64(series)?) {
                if let Some(value) = value {
                    record.features.insert(name.clone(), value);
                }
            }
        } else {
            for (record, value) in records.iter_mut().zip(column_text(series)?) {
                if let Some(value) = value {
                    record.attributes.insert(name.clone(), value);
                }
            }
        }
    }

    let table = SiteTable::new(records);
    info!(
        path = %path.display(),
        sites = table.len(),
        regions = table.regions().len(),
        "loaded site table"
    );
    Ok(table)
}
