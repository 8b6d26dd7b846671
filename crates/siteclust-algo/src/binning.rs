//! Discretize a numeric feature into bins.
//!
//! Two ways to build edges:
//!
//! - **Quantiles** (`q`): linear-interpolated sample quantiles. The first
//!   interval includes its left edge so the minimum is always binned.
//! - **Fixed** (`bins`): a count of equal-width bins spanning the data (the
//!   left edge is widened by 0.1% of the range so the minimum falls inside),
//!   or explicit edges.
//!
//! Intervals are right-closed `(a, b]` and duplicate edges are collapsed, so a
//! heavily tied feature yields fewer bins than requested. Labels are `0..`.

use std::collections::BTreeSet;

use siteclust_core::{
    canonical_name, BinEdges, BinSpec, ClusterError, ClusterResult, Diagnostics, FeatureKind,
    KeyValue, Quantiles, SiteTable, PROFILE_COL,
};
use tracing::info;

/// Linear-interpolated quantile of already sorted values.
fn quantile(sorted: &[f64], fraction: f64) -> f64 {
    let pos = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn dedup_edges(mut edges: Vec<f64>) -> Vec<f64> {
    edges.sort_by(f64::total_cmp);
    edges.dedup();
    edges
}

fn quantile_edges(values: &[f64], q: &Quantiles) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);
    let fractions: Vec<f64> = match q {
        Quantiles::Count(n) => (0..=*n).map(|i| i as f64 / *n as f64).collect(),
        Quantiles::Fractions(f) => f.clone(),
    };
    dedup_edges(fractions.iter().map(|f| quantile(&sorted, *f)).collect())
}

fn equal_width_edges(values: &[f64], count: usize) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (mut lo, mut hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return Vec::new();
    }
    if lo == hi {
        let pad = if lo == 0.0 { 0.001 } else { 0.001 * lo.abs() };
        lo -= pad;
        hi += pad;
        return linspace(lo, hi, count);
    }
    let mut edges = linspace(lo, hi, count);
    edges[0] -= (hi - lo) * 0.001;
    edges
}

fn linspace(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    let step = (hi - lo) / count as f64;
    (0..=count)
        .map(|i| if i == count { hi } else { lo + step * i as f64 })
        .collect()
}

/// Assign each value to a right-closed interval of `edges`.
fn cut(values: &[f64], edges: &[f64], include_lowest: bool) -> Vec<Option<i64>> {
    if edges.len() < 2 {
        // Every value tied on a single edge: one bin.
        return values
            .iter()
            .map(|v| (edges.first() == Some(v)).then_some(0))
            .collect();
    }
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return None;
            }
            let mut idx = edges.partition_point(|e| *e < v);
            if include_lowest && v == edges[0] {
                idx = 1;
            }
            (1..edges.len())
                .contains(&idx)
                .then(|| idx as i64 - 1)
        })
        .collect()
}

/// Bin labels for `values` under `spec`; `None` marks a value outside every bin.
///
/// A spec without `q` or `bins` records a warning and puts every value in
/// bin `1`.
pub fn value_bin(values: &[f64], spec: &BinSpec, diag: &mut Diagnostics) -> Vec<Option<i64>> {
    if values.is_empty() {
        return Vec::new();
    }
    let q = spec
        .q
        .as_ref()
        .filter(|q| !matches!(q, Quantiles::Count(0)));
    let bins = spec
        .bins
        .as_ref()
        .filter(|b| !matches!(b, BinEdges::Count(0)));

    match (q, bins) {
        (Some(q), _) => cut(values, &quantile_edges(values, q), true),
        (None, Some(BinEdges::Count(n))) => cut(values, &equal_width_edges(values, *n), false),
        (None, Some(BinEdges::Edges(edges))) => cut(values, &dedup_edges(edges.clone()), false),
        (None, None) => {
            diag.add_warning_with_entity(
                "binning",
                "bin spec has neither q nor bins; every site is placed in bin 1",
                &spec.feature,
            );
            vec![Some(1); values.len()]
        }
    }
}

/// Check every bin spec against the table before any binning happens.
pub fn validate_bin_specs(table: &SiteTable, specs: &[BinSpec]) -> ClusterResult<()> {
    for spec in specs {
        let feature = canonical_name(&spec.feature);
        if feature == PROFILE_COL {
            return Err(ClusterError::Validation(
                "cannot bin on 'profile'; bin features must be numeric site columns".to_string(),
            ));
        }
        match table.feature_kind(&feature) {
            Some(FeatureKind::Numeric) => {}
            Some(FeatureKind::Text) => {
                return Err(ClusterError::Validation(format!(
                    "bin feature '{}' is not numeric",
                    spec.feature
                )))
            }
            None => {
                return Err(ClusterError::Validation(format!(
                    "bin feature '{}' is not a column of the site data",
                    spec.feature
                )))
            }
        }
        if let Some(Quantiles::Fractions(fractions)) = &spec.q {
            if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
                return Err(ClusterError::Validation(format!(
                    "quantiles for '{}' must lie in [0, 1]",
                    spec.feature
                )));
            }
        }
        if spec.q.is_none() {
            if let Some(BinEdges::Edges(edges)) = &spec.bins {
                if edges.windows(2).any(|w| w[0] > w[1]) || edges.iter().any(|e| !e.is_finite()) {
                    return Err(ClusterError::Validation(format!(
                        "bin edges for '{}' must be finite and increase monotonically",
                        spec.feature
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Bin the table on one feature, writing the label into the `<feature>_bin`
/// key column. Returns the new table and the key column name.
///
/// Rows without a value, or outside explicit edges, are dropped with a warning.
pub fn apply_bin(
    table: SiteTable,
    spec: &BinSpec,
    diag: &mut Diagnostics,
) -> (SiteTable, String) {
    let feature = canonical_name(&spec.feature);
    let key = format!("{}_bin", feature);

    let (with_value, without_value): (Vec<_>, Vec<_>) = table
        .into_iter()
        .partition(|r| r.numeric(&feature).is_some());
    if !without_value.is_empty() {
        diag.add_warning_with_entity(
            "binning",
            &format!("{} sites have no value and were dropped", without_value.len()),
            &spec.feature,
        );
    }

    let values: Vec<f64> = with_value
        .iter()
        .filter_map(|r| r.numeric(&feature))
        .collect();
    let labels = value_bin(&values, spec, diag);

    let mut dropped = 0usize;
    let mut records = Vec::with_capacity(with_value.len());
    for (mut record, label) in with_value.into_iter().zip(labels) {
        match label {
            Some(label) => {
                record.keys.insert(key.clone(), KeyValue::Int(label));
                records.push(record);
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        diag.add_warning_with_entity(
            "binning",
            &format!("{} sites fall outside the bin edges and were dropped", dropped),
            &spec.feature,
        );
    }

    let binned = SiteTable::new(records);
    let distinct: BTreeSet<&KeyValue> = binned.iter().filter_map(|r| r.keys.get(&key)).collect();
    info!(
        feature = %feature,
        sites = binned.len(),
        bins = distinct.len(),
        "binned sites"
    );
    (binned, key)
}
