//! Multi-stage clustering with globally unique labels.
//!
//! Each stage clusters every group of rows that share the accumulated key
//! tuple (bins, group-by columns and earlier stages' labels). Labels are made
//! unique across groups by offsetting each group's local labels by the number
//! of labels the groups before it consumed.
//!
//! The offsets depend only on group sizes and the requested count, so they are
//! computed up front in one sequential pass and the groups are then clustered
//! in parallel.

use std::collections::BTreeMap;

use rayon::prelude::*;
use siteclust_core::{
    canonical_name, ClusterError, ClusterResult, ClusterStageSpec, Diagnostics, KeyValue,
    SiteRecord, SiteTable, PROFILE_COL,
};
use tracing::{debug, info};

use crate::clusterer::{
    coerce_cluster_count, ClusterMethod, ClusterMethodRegistry, CountCoercion, FeatureData,
};

/// The table plus the grouping columns accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct ClusterAccumulator {
    pub table: SiteTable,
    pub group_keys: Vec<String>,
}

impl ClusterAccumulator {
    pub fn new(table: SiteTable, group_keys: Vec<String>) -> Self {
        Self { table, group_keys }
    }
}

/// Requested clusters per group for a stage.
///
/// `n_clusters` wins; otherwise `floor(total_mw / mw_per_cluster) + 1` over
/// the whole table.
pub fn resolve_cluster_count(stage: &ClusterStageSpec, table: &SiteTable) -> ClusterResult<i64> {
    if let Some(n) = stage.n_clusters {
        return Ok(n);
    }
    match stage.mw_per_cluster {
        Some(mw) if mw.is_finite() && mw > 0.0 => {
            Ok((table.total_capacity_mw() / mw).floor() as i64 + 1)
        }
        Some(mw) => Err(ClusterError::Config(format!(
            "cluster stage on '{}': mw_per_cluster must be positive, got {}",
            stage.feature, mw
        ))),
        None => Err(ClusterError::Config(format!(
            "cluster stage on '{}' needs n_clusters or mw_per_cluster",
            stage.feature
        ))),
    }
}

fn stage_data<'a>(
    table: &'a SiteTable,
    rows: &[usize],
    feature: &str,
) -> ClusterResult<FeatureData<'a>> {
    if feature == PROFILE_COL {
        let profiles = rows
            .iter()
            .map(|&i| {
                let record = &table.records[i];
                record.profile.as_deref().ok_or_else(|| {
                    ClusterError::Validation(format!(
                        "site '{}' has no profile to cluster on",
                        record.site_id
                    ))
                })
            })
            .collect::<ClusterResult<Vec<_>>>()?;
        Ok(FeatureData::Profiles(profiles))
    } else {
        let values = rows
            .iter()
            .map(|&i| {
                let record = &table.records[i];
                record.numeric(feature).ok_or_else(|| {
                    ClusterError::Validation(format!(
                        "site '{}' has no numeric value for cluster feature '{}'",
                        record.site_id, feature
                    ))
                })
            })
            .collect::<ClusterResult<Vec<_>>>()?;
        Ok(FeatureData::Scalars(values))
    }
}

fn key_tuple(record: &SiteRecord, keys: &[String]) -> Vec<KeyValue> {
    keys.iter().map(|k| record.key_value(k)).collect()
}

/// Row indices per distinct key tuple, in sorted key order.
fn partition_rows(table: &SiteTable, keys: &[String]) -> BTreeMap<Vec<KeyValue>, Vec<usize>> {
    let mut groups: BTreeMap<Vec<KeyValue>, Vec<usize>> = BTreeMap::new();
    for (idx, record) in table.iter().enumerate() {
        groups.entry(key_tuple(record, keys)).or_default().push(idx);
    }
    groups
}

/// One group's share of the label space.
struct GroupPlan {
    rows: Vec<usize>,
    offset: u32,
    n_clusters: usize,
}

fn check_labels(labels: &[u32], n_items: usize, n_clusters: usize, method: &str) -> ClusterResult<()> {
    if labels.len() != n_items {
        return Err(ClusterError::Other(format!(
            "method '{}' returned {} labels for {} sites",
            method,
            labels.len(),
            n_items
        )));
    }
    if let Some(bad) = labels
        .iter()
        .find(|&&l| l == 0 || l as usize > n_clusters)
    {
        return Err(ClusterError::Other(format!(
            "method '{}' returned label {} outside 1..={}",
            method, bad, n_clusters
        )));
    }
    Ok(())
}

fn run_grouped_stage(
    table: &SiteTable,
    keys: &[String],
    stage: &ClusterStageSpec,
    feature: &str,
    method: &dyn ClusterMethod,
    requested: i64,
    diag: &mut Diagnostics,
) -> ClusterResult<Vec<u32>> {
    let groups = partition_rows(table, keys);

    let mut plans = Vec::with_capacity(groups.len());
    let mut next_offset = 0u32;
    let mut clipped = 0usize;
    let mut non_positive = false;
    for rows in groups.into_values() {
        let n_clusters = if rows.len() == 1 {
            1
        } else {
            let (k, coercion) = coerce_cluster_count(requested, rows.len());
            match coercion {
                Some(CountCoercion::NonPositive) => non_positive = true,
                Some(CountCoercion::ExceedsItems) => clipped += 1,
                None => {}
            }
            k
        };
        plans.push(GroupPlan {
            rows,
            offset: next_offset,
            n_clusters,
        });
        next_offset += n_clusters as u32;
    }
    if non_positive {
        diag.add_warning_with_entity(
            "clustering",
            &format!("n_clusters must be >= 1 but was {}; using 1 cluster per group", requested),
            &stage.feature,
        );
    }
    if clipped > 0 {
        diag.add_warning_with_entity(
            "clustering",
            &format!(
                "{} groups have fewer sites than n_clusters = {}; each of their sites is its own cluster",
                clipped, requested
            ),
            &stage.feature,
        );
    }

    let results: Vec<Vec<u32>> = plans
        .par_iter()
        .map(|plan| -> ClusterResult<Vec<u32>> {
            if plan.rows.len() == 1 {
                return Ok(vec![plan.offset + 1]);
            }
            let data = stage_data(table, &plan.rows, feature)?;
            let local = method.partition(&data, plan.n_clusters as i64, stage)?;
            check_labels(&local, plan.rows.len(), plan.n_clusters, method.id())?;
            debug!(
                feature,
                sites = plan.rows.len(),
                clusters = plan.n_clusters,
                offset = plan.offset,
                "clustered group"
            );
            Ok(local.into_iter().map(|l| plan.offset + l).collect())
        })
        .collect::<ClusterResult<_>>()?;

    let mut labels = vec![0u32; table.len()];
    for (plan, group_labels) in plans.iter().zip(results) {
        for (&row, label) in plan.rows.iter().zip(group_labels) {
            labels[row] = label;
        }
    }
    info!(
        feature,
        groups = plans.len(),
        clusters = next_offset,
        "grouped cluster stage"
    );
    Ok(labels)
}

fn run_ungrouped_stage(
    table: &SiteTable,
    stage: &ClusterStageSpec,
    feature: &str,
    method: &dyn ClusterMethod,
    requested: i64,
    diag: &mut Diagnostics,
) -> ClusterResult<Vec<u32>> {
    let n = table.len();
    match n {
        0 => return Ok(Vec::new()),
        1 => return Ok(vec![1]),
        _ => {}
    }
    let rows: Vec<usize> = (0..n).collect();
    let data = stage_data(table, &rows, feature)?;
    let (n_clusters, coercion) = coerce_cluster_count(requested, n);
    if let Some(coercion) = coercion {
        diag.add_warning_with_entity("clustering", &coercion.message(requested, n), &stage.feature);
    }
    let labels = method.partition(&data, n_clusters as i64, stage)?;
    check_labels(&labels, n, n_clusters, method.id())?;
    info!(feature, sites = n, clusters = n_clusters, "cluster stage");
    Ok(labels)
}

/// Sequential labels when no stage ran: one per key tuple, or one per row.
fn fallback_labels(table: SiteTable, keys: &[String]) -> SiteTable {
    if keys.is_empty() {
        return table
            .into_iter()
            .zip(1u32..)
            .map(|(mut record, label)| {
                record.cluster = Some(label);
                record
            })
            .collect();
    }
    let groups = partition_rows(&table, keys);
    let mut labels = vec![0u32; table.len()];
    for (rows, label) in groups.into_values().zip(1u32..) {
        for row in rows {
            labels[row] = label;
        }
    }
    table
        .into_iter()
        .zip(labels)
        .map(|(mut record, label)| {
            record.cluster = Some(label);
            record
        })
        .collect()
}

/// Run the clustering stages in order.
///
/// Before each stage after the first, the previous stage's label moves into
/// the `<previous feature>_clust` key column; after each stage that column
/// name joins the accumulated keys. With no stages, every key tuple (or every
/// row, when there are no keys) becomes its own cluster.
pub fn run_cluster_stages(
    acc: ClusterAccumulator,
    stages: &[ClusterStageSpec],
    registry: &ClusterMethodRegistry,
    diag: &mut Diagnostics,
) -> ClusterResult<ClusterAccumulator> {
    let ClusterAccumulator {
        mut table,
        group_keys: mut keys,
    } = acc;

    if stages.is_empty() {
        let table = fallback_labels(table, &keys);
        return Ok(ClusterAccumulator::new(table, keys));
    }

    let mut previous: Option<String> = None;
    for stage in stages {
        let method = registry.get(&stage.method).ok_or_else(|| {
            ClusterError::Config(format!(
                "unknown cluster method '{}' (available: {})",
                stage.method,
                registry.list_methods().join(", ")
            ))
        })?;
        let feature = canonical_name(&stage.feature);
        let requested = resolve_cluster_count(stage, &table)?;

        if let Some(prev) = &previous {
            let column = format!("{}_clust", prev);
            for record in &mut table.records {
                if let Some(label) = record.cluster.take() {
                    record.keys.insert(column.clone(), KeyValue::Int(label as i64));
                }
            }
        }

        let labels = if keys.is_empty() {
            run_ungrouped_stage(&table, stage, &feature, method.as_ref(), requested, diag)?
        } else {
            run_grouped_stage(&table, &keys, stage, &feature, method.as_ref(), requested, diag)?
        };
        for (record, label) in table.records.iter_mut().zip(labels) {
            record.cluster = Some(label);
        }

        keys.push(format!("{}_clust", feature));
        previous = Some(feature);
    }

    Ok(ClusterAccumulator::new(table, keys))
}
