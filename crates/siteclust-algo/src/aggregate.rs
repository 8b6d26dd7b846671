//! Collapse clustered sites into one summary row per cluster.
//!
//! Member weights are the weight field divided by the cluster total, so they
//! sum to one. Means and the profile are weighted by them; sums are plain.

use std::collections::BTreeMap;

use siteclust_core::{
    canonical_name, AggregateSpec, ClusterError, ClusterResult, ClusterSummary, Diagnostics,
    FeatureKind, SiteRecord, SiteTable,
};
use tracing::info;

fn present_fields(
    table: &SiteTable,
    fields: &[String],
    role: &str,
    diag: &mut Diagnostics,
) -> Vec<String> {
    let mut present = Vec::with_capacity(fields.len());
    for field in fields {
        let name = canonical_name(field);
        if table.feature_kind(&name) == Some(FeatureKind::Numeric) {
            present.push(name);
        } else {
            diag.add_warning_with_entity(
                "aggregation",
                &format!("{} field is not a numeric column and is skipped", role),
                field,
            );
        }
    }
    present
}

fn member_weights(
    members: &[&SiteRecord],
    weight: &str,
    cluster: u32,
    diag: &mut Diagnostics,
) -> Vec<f64> {
    let raw: Vec<f64> = members
        .iter()
        .map(|r| r.numeric(weight).unwrap_or(0.0))
        .collect();
    let total: f64 = raw.iter().sum();
    if total.is_finite() && total != 0.0 {
        return raw.iter().map(|w| w / total).collect();
    }
    diag.add_warning_with_entity(
        "aggregation",
        &format!("cluster {} has zero total weight; members are weighted equally", cluster),
        weight,
    );
    vec![1.0 / members.len() as f64; members.len()]
}

fn weighted_profile(members: &[&SiteRecord], weights: &[f64]) -> ClusterResult<Option<Vec<f64>>> {
    let Some(profiles) = members
        .iter()
        .map(|r| r.profile.as_deref())
        .collect::<Option<Vec<_>>>()
    else {
        return Ok(None);
    };
    let len = profiles.first().map_or(0, |p| p.len());
    let mut out = vec![0.0; len];
    for (profile, w) in profiles.iter().zip(weights) {
        if profile.len() != len {
            return Err(ClusterError::Validation(format!(
                "cannot average profiles of length {} and {}",
                len,
                profile.len()
            )));
        }
        for (acc, v) in out.iter_mut().zip(profile.iter()) {
            *acc += v * w;
        }
    }
    Ok(Some(out))
}

/// One summary per distinct cluster label, in ascending label order.
///
/// # Errors
///
/// - [`ClusterError::Precondition`] if the weight field is not a numeric column
///   or any row is unlabelled
pub fn aggregate_clusters(
    table: &SiteTable,
    spec: &AggregateSpec,
    diag: &mut Diagnostics,
) -> ClusterResult<Vec<ClusterSummary>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let weight = canonical_name(&spec.weight);
    if table.feature_kind(&weight) != Some(FeatureKind::Numeric) {
        return Err(ClusterError::Precondition(format!(
            "weight field '{}' is not a numeric column of the clustered sites",
            spec.weight
        )));
    }
    let sum_fields = present_fields(table, &spec.sums, "sum", diag);
    let mean_fields = present_fields(table, &spec.means, "mean", diag);

    let mut clusters: BTreeMap<u32, Vec<&SiteRecord>> = BTreeMap::new();
    for record in table.iter() {
        let cluster = record.cluster.ok_or_else(|| {
            ClusterError::Precondition(format!("site '{}' has no cluster label", record.site_id))
        })?;
        clusters.entry(cluster).or_default().push(record);
    }

    let mut summaries = Vec::with_capacity(clusters.len());
    for (cluster, members) in clusters {
        let weights = member_weights(&members, &weight, cluster, diag);

        let sums: BTreeMap<String, f64> = sum_fields
            .iter()
            .map(|field| {
                let total: f64 = members.iter().filter_map(|r| r.numeric(field)).sum();
                (field.clone(), total)
            })
            .collect();

        let means: BTreeMap<String, f64> = mean_fields
            .iter()
            .filter_map(|field| {
                let (mut num, mut den, mut plain, mut count) = (0.0, 0.0, 0.0, 0usize);
                for (record, w) in members.iter().zip(&weights) {
                    if let Some(v) = record.numeric(field) {
                        num += v * w;
                        den += w;
                        plain += v;
                        count += 1;
                    }
                }
                match (count, den) {
                    (0, _) => None,
                    (_, d) if d == 0.0 => Some((field.clone(), plain / count as f64)),
                    _ => Some((field.clone(), num / den)),
                }
            })
            .collect();

        let first_region = &members[0].region;
        let region = members
            .iter()
            .all(|r| &r.region == first_region)
            .then(|| first_region.clone());

        summaries.push(ClusterSummary {
            cluster,
            region,
            site_count: members.len(),
            sums,
            means,
            profile: weighted_profile(&members, &weights)?,
        });
    }

    info!(
        sites = table.len(),
        clusters = summaries.len(),
        "aggregated clusters"
    );
    Ok(summaries)
}
