use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use siteclust_algo::{assign_clusters_for_groups, ClusterMethodRegistry, ClusterRun, ProfileJoin};
use siteclust_core::{load_settings_from_path, resolve_groups};
use siteclust_io::{
    load_profiles, load_site_map, load_sites, write_cluster_table, write_summaries,
    write_summary_profiles,
};
use tracing::{info, warn};

use super::util::{group_output_path, relative_to};

pub struct RunArgs<'a> {
    pub sites: &'a Path,
    pub settings: &'a Path,
    pub profiles: Option<&'a Path>,
    pub site_map: Option<&'a Path>,
    pub out: &'a Path,
    pub summary_out: Option<&'a Path>,
    pub profiles_out: Option<&'a Path>,
    pub diagnostics_out: Option<&'a Path>,
}

pub fn handle(args: &RunArgs<'_>) -> Result<()> {
    let start = Instant::now();
    let file = load_settings_from_path(args.settings)?;
    let groups = resolve_groups(&file)?;
    let sites = load_sites(args.sites)?;
    info!(sites = sites.len(), groups = groups.len(), "loaded inputs");

    let profile_path: Option<PathBuf> = args
        .profiles
        .map(Path::to_path_buf)
        .or_else(|| file.profiles.as_deref().map(|p| relative_to(args.settings, p)));
    let site_map_path: Option<PathBuf> = args
        .site_map
        .map(Path::to_path_buf)
        .or_else(|| file.site_map.as_deref().map(|p| relative_to(args.settings, p)));

    let profiles = profile_path.as_deref().map(load_profiles).transpose()?;
    let site_map = site_map_path.as_deref().map(load_site_map).transpose()?;
    if profiles.is_none() && site_map.is_some() {
        warn!("site map given without a profile table; ignoring it");
    }
    let join = profiles.as_ref().map(|table| {
        let join = ProfileJoin::new(table);
        match &site_map {
            Some(map) => join.with_site_map(map),
            None => join,
        }
    });

    let registry = ClusterMethodRegistry::with_defaults();
    let runs = assign_clusters_for_groups(&sites, &groups, join.as_ref(), &registry)?;

    let per_group = runs.len() > 1;
    for run in &runs {
        write_run(run, args, per_group)?;
    }

    if let Some(path) = args.diagnostics_out {
        let report: Vec<_> = runs
            .iter()
            .map(|run| json!({ "group": run.name, "diagnostics": run.diagnostics }))
            .collect();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing diagnostics to {}", path.display()))?;
    }

    info!(
        groups = runs.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(())
}

fn write_run(run: &ClusterRun, args: &RunArgs<'_>, per_group: bool) -> Result<()> {
    let target = |path: &Path| {
        if per_group {
            group_output_path(path, &run.name)
        } else {
            path.to_path_buf()
        }
    };

    let out = target(args.out);
    write_cluster_table(&run.table, &out)?;
    info!(
        group = %run.name,
        sites = run.table.len(),
        clusters = run.cluster_count(),
        warnings = run.diagnostics.warning_count(),
        "wrote {}",
        out.display()
    );

    let summaries = run.summaries.as_deref();
    if let Some(path) = args.summary_out {
        match summaries {
            Some(summaries) => write_summaries(summaries, &target(path))?,
            None => warn!(group = %run.name, "no aggregate settings; skipping cluster summary"),
        }
    }
    if let Some(path) = args.profiles_out {
        match summaries {
            Some(summaries) if summaries.iter().any(|s| s.profile.is_some()) => {
                write_summary_profiles(summaries, &target(path))?
            }
            _ => warn!(group = %run.name, "no cluster profiles; skipping profile output"),
        }
    }
    Ok(())
}
