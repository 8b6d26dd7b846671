use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Result};
use polars::prelude::*;
use siteclust_algo::CostBinSummary;
use siteclust_core::{ClusterSummary, KeyValue, SiteTable};
use tracing::info;

use crate::write_frame;

/// Write every site with its cluster label and derived grouping keys.
pub fn write_cluster_table(table: &SiteTable, path: &Path) -> Result<()> {
    let features: BTreeSet<&str> = table
        .iter()
        .flat_map(|r| r.features.keys().map(String::as_str))
        .collect();
    let attributes: BTreeSet<&str> = table
        .iter()
        .flat_map(|r| r.attributes.keys().map(String::as_str))
        .collect();
    let keys: BTreeSet<&str> = table
        .iter()
        .flat_map(|r| r.keys.keys().map(String::as_str))
        .collect();

    let mut columns = vec![
        Series::new(
            "site_id",
            table.iter().map(|r| r.site_id.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "region",
            table.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "capacity_mw",
            table.iter().map(|r| r.capacity_mw).collect::<Vec<_>>(),
        ),
        Series::new("cost", table.iter().map(|r| r.cost).collect::<Vec<_>>()),
        Series::new("cluster", table.iter().map(|r| r.cluster).collect::<Vec<_>>()),
    ];
    for name in features {
        let values: Vec<Option<f64>> = table.iter().map(|r| r.features.get(name).copied()).collect();
        columns.push(Series::new(name, values));
    }
    for name in attributes {
        let values: Vec<Option<String>> =
            table.iter().map(|r| r.attributes.get(name).cloned()).collect();
        columns.push(Series::new(name, values));
    }
    for name in keys {
        let values: Vec<Option<String>> = table
            .iter()
            .map(|r| match r.keys.get(name) {
                None | Some(KeyValue::Missing) => None,
                Some(value) => Some(value.to_string()),
            })
            .collect();
        columns.push(Series::new(name, values));
    }

    let mut df = DataFrame::new(columns)?;
    write_frame(&mut df, path)?;
    info!(path = %path.display(), rows = df.height(), "wrote cluster table");
    Ok(())
}

/// Write one row per cluster. A mean whose name is also a sum is written as
/// `<name>_mean`.
pub fn write_summaries(summaries: &[ClusterSummary], path: &Path) -> Result<()> {
    let sum_names: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.sums.keys().map(String::as_str))
        .collect();
    let mean_names: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.means.keys().map(String::as_str))
        .collect();

    let mut columns = vec![
        Series::new(
            "cluster",
            summaries.iter().map(|s| s.cluster).collect::<Vec<_>>(),
        ),
        Series::new(
            "region",
            summaries.iter().map(|s| s.region.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "site_count",
            summaries
                .iter()
                .map(|s| s.site_count as u64)
                .collect::<Vec<_>>(),
        ),
    ];
    for name in &sum_names {
        let values: Vec<Option<f64>> = summaries.iter().map(|s| s.sums.get(*name).copied()).collect();
        columns.push(Series::new(name, values));
    }
    for name in &mean_names {
        let column = if sum_names.contains(name) {
            format!("{}_mean", name)
        } else {
            name.to_string()
        };
        let values: Vec<Option<f64>> = summaries.iter().map(|s| s.means.get(*name).copied()).collect();
        columns.push(Series::new(&column, values));
    }

    let mut df = DataFrame::new(columns)?;
    write_frame(&mut df, path)?;
    info!(path = %path.display(), clusters = df.height(), "wrote cluster summaries");
    Ok(())
}

/// Write the aggregated profiles as a wide table with one column per cluster.
pub fn write_summary_profiles(summaries: &[ClusterSummary], path: &Path) -> Result<()> {
    let with_profiles: Vec<(u32, &Vec<f64>)> = summaries
        .iter()
        .filter_map(|s| s.profile.as_ref().map(|p| (s.cluster, p)))
        .collect();
    let Some((_, first)) = with_profiles.first() else {
        bail!("no cluster carries an aggregated profile");
    };
    let hours = first.len();

    let mut columns = Vec::with_capacity(with_profiles.len());
    for (cluster, profile) in &with_profiles {
        if profile.len() != hours {
            bail!(
                "profile of cluster {} has {} values, expected {}",
                cluster,
                profile.len(),
                hours
            );
        }
        columns.push(Series::new(&cluster.to_string(), profile.as_slice()));
    }

    let mut df = DataFrame::new(columns)?;
    write_frame(&mut df, path)?;
    info!(
        path = %path.display(),
        clusters = with_profiles.len(),
        hours,
        "wrote cluster profiles"
    );
    Ok(())
}

/// Write capacity per region and cost band in long form. Capacity outside
/// every band is reported on an `unbinned` row.
pub fn write_cost_bin_summary(summaries: &[CostBinSummary], path: &Path) -> Result<()> {
    let mut region = Vec::new();
    let mut band = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    let mut capacity = Vec::new();
    for summary in summaries {
        for bin in &summary.bins {
            region.push(summary.region.clone());
            band.push(bin.label.clone());
            lower.push(Some(bin.lower));
            upper.push(Some(bin.upper));
            capacity.push(bin.capacity_mw);
        }
        region.push(summary.region.clone());
        band.push("unbinned".to_string());
        lower.push(None);
        upper.push(None);
        capacity.push(summary.unbinned_mw);
    }

    let mut df = DataFrame::new(vec![
        Series::new("region", region),
        Series::new("cost_bin", band),
        Series::new("lower", lower),
        Series::new("upper", upper),
        Series::new("capacity_mw", capacity),
    ])?;
    write_frame(&mut df, path)?;
    info!(path = %path.display(), rows = df.height(), "wrote cost bin summary");
    Ok(())
}
