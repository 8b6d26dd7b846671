//! The full reduction of one settings group.
//!
//! Stages run in a fixed order, each consuming the previous table:
//!
//! 1. keep the group's regions
//! 2. value filters
//! 3. merit-order capacity selection
//! 4. profile join (site-map remapping, `utc_offset` shift)
//! 5. binning, after every bin spec has been validated
//! 6. group-by columns
//! 7. cluster stages
//! 8. optional aggregation

use std::collections::BTreeMap;

use rayon::prelude::*;
use siteclust_core::{
    canonical_name, ClusterError, ClusterResult, ClusterSettings, ClusterSummary, Diagnostics,
    SiteTable, PROFILE_COL,
};
use tracing::{error, info};

use crate::aggregate::aggregate_clusters;
use crate::binning::{apply_bin, validate_bin_specs};
use crate::clusterer::ClusterMethodRegistry;
use crate::driver::{run_cluster_stages, ClusterAccumulator};
use crate::filter::value_filter;
use crate::profiles::{attach_profiles, ProfileJoin};
use crate::selection::select_min_capacity;

/// Output of one settings group.
#[derive(Debug, Clone)]
pub struct ClusterRun {
    pub name: String,
    /// Surviving sites, each with its cluster label
    pub table: SiteTable,
    /// Present when the settings ask for aggregation
    pub summaries: Option<Vec<ClusterSummary>>,
    pub diagnostics: Diagnostics,
}

impl ClusterRun {
    /// `site_id -> cluster` for every surviving site.
    pub fn assignment(&self) -> BTreeMap<String, u32> {
        self.table.cluster_assignment()
    }

    pub fn cluster_count(&self) -> usize {
        self.table.cluster_labels().len()
    }
}

/// Reduce the sites of one settings group to labelled clusters.
///
/// `profiles` is required when a stage clusters on `profile` and the sites do
/// not already carry profiles.
pub fn assign_site_clusters(
    table: &SiteTable,
    settings: &ClusterSettings,
    profiles: Option<&ProfileJoin<'_>>,
    registry: &ClusterMethodRegistry,
) -> ClusterResult<ClusterRun> {
    let name = settings.label();
    let mut diag = Diagnostics::new();

    let mut sites: SiteTable = table
        .restrict_regions(&settings.regions)
        .into_iter()
        .map(|mut record| {
            record.keys.clear();
            record.cluster = None;
            record
        })
        .collect();
    info!(group = %name, sites = sites.len(), "selected regions");

    for filter in &settings.filter {
        sites = value_filter(sites, filter);
    }
    if sites.is_empty() {
        diag.add_warning_with_entity("filter", "no sites remain after filtering", &name);
        return Ok(ClusterRun {
            name,
            table: sites,
            summaries: settings.aggregate.as_ref().map(|_| Vec::new()),
            diagnostics: diag,
        });
    }

    sites = select_min_capacity(sites, settings.min_capacity, &mut diag);

    let needs_profiles = settings
        .cluster
        .iter()
        .any(|stage| canonical_name(&stage.feature) == PROFILE_COL);
    match profiles {
        Some(join) => sites = attach_profiles(sites, join, settings.utc_offset)?,
        None if needs_profiles && !sites.iter().all(|r| r.profile.is_some()) => {
            return Err(ClusterError::Validation(format!(
                "group '{}' clusters on profile but no profile source was given",
                name
            )));
        }
        None => {}
    }

    validate_bin_specs(&sites, &settings.bin)?;
    let mut keys = Vec::with_capacity(settings.bin.len() + settings.group.len());
    for spec in &settings.bin {
        let (binned, key) = apply_bin(sites, spec, &mut diag);
        sites = binned;
        keys.push(key);
    }

    for column in &settings.group {
        if !sites.has_column(column) {
            return Err(ClusterError::Validation(format!(
                "group-by column '{}' is not a column of the site data",
                column
            )));
        }
        keys.push(canonical_name(column));
    }

    let acc = run_cluster_stages(
        ClusterAccumulator::new(sites, keys),
        &settings.cluster,
        registry,
        &mut diag,
    )?;
    let sites = acc.table;

    let summaries = settings
        .aggregate
        .as_ref()
        .map(|spec| aggregate_clusters(&sites, spec, &mut diag))
        .transpose()?;

    info!(
        group = %name,
        sites = sites.len(),
        clusters = sites.cluster_labels().len(),
        warnings = diag.warning_count(),
        "cluster assignment complete"
    );
    Ok(ClusterRun {
        name,
        table: sites,
        summaries,
        diagnostics: diag,
    })
}

/// Run several settings groups over the same sites in parallel.
///
/// Results come back in the order of `groups`. If any group fails, one of the
/// failures is returned.
pub fn assign_clusters_for_groups(
    table: &SiteTable,
    groups: &[ClusterSettings],
    profiles: Option<&ProfileJoin<'_>>,
    registry: &ClusterMethodRegistry,
) -> ClusterResult<Vec<ClusterRun>> {
    groups
        .par_iter()
        .map(|settings| {
            assign_site_clusters(table, settings, profiles, registry).inspect_err(|err| {
                error!(group = %settings.label(), "cluster assignment failed: {}", err)
            })
        })
        .collect()
}
