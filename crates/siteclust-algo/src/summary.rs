//! Available capacity by cost bin, per region.
//!
//! A quick look at a resource supply curve before clustering: how many MW sit
//! in each levelized-cost band of every region.

use std::collections::BTreeMap;

use serde::Serialize;
use siteclust_core::{ClusterError, ClusterResult, SiteTable};

/// Default cost band edges ($/MWh).
pub const DEFAULT_COST_BIN_EDGES: [f64; 16] = [
    0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 125.0, 150.0, 175.0, 200.0,
    5000.0,
];

/// Capacity in one right-closed cost band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBinCapacity {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub capacity_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBinSummary {
    pub region: String,
    pub bins: Vec<CostBinCapacity>,
    pub total_mw: f64,
    /// Capacity of sites without a cost or with a cost outside the edges
    pub unbinned_mw: f64,
}

/// Sum capacity into `(edges[i], edges[i + 1]]` bands for every region.
///
/// Regions are returned in sorted order. `edges` must hold at least two
/// strictly increasing values.
pub fn capacity_by_cost_bin(table: &SiteTable, edges: &[f64]) -> ClusterResult<Vec<CostBinSummary>> {
    if edges.len() < 2 || edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ClusterError::Validation(
            "cost bin edges need at least two strictly increasing values".to_string(),
        ));
    }

    let mut by_region: BTreeMap<&str, (Vec<f64>, f64, f64)> = BTreeMap::new();
    for record in table.iter() {
        let (bins, total, unbinned) = by_region
            .entry(record.region.as_str())
            .or_insert_with(|| (vec![0.0; edges.len() - 1], 0.0, 0.0));
        *total += record.capacity_mw;
        let bin = record.cost.and_then(|cost| {
            let idx = edges.partition_point(|e| *e < cost);
            (1..edges.len()).contains(&idx).then(|| idx - 1)
        });
        match bin {
            Some(idx) => bins[idx] += record.capacity_mw,
            None => *unbinned += record.capacity_mw,
        }
    }

    let summaries = by_region
        .into_iter()
        .map(|(region, (capacity, total_mw, unbinned_mw))| {
            debug_assert!(
                (capacity.iter().sum::<f64>() + unbinned_mw - total_mw).abs()
                    <= 1e-9 * total_mw.abs().max(1.0)
            );
            let bins = capacity
                .into_iter()
                .enumerate()
                .map(|(i, capacity_mw)| CostBinCapacity {
                    label: format!("({}, {}]", edges[i], edges[i + 1]),
                    lower: edges[i],
                    upper: edges[i + 1],
                    capacity_mw,
                })
                .collect();
            CostBinSummary {
                region: region.to_string(),
                bins,
                total_mw,
                unbinned_mw,
            }
        })
        .collect();
    Ok(summaries)
}
