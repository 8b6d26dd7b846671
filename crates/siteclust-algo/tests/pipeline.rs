//! End-to-end tests of the reduction pipeline.
//!
//! Each test builds a small site table in memory, runs one settings group and
//! checks a property of the labelled output.

use std::collections::{BTreeSet, HashMap};

use siteclust_algo::{
    assign_site_clusters, ClusterMethodRegistry, ClusterRun, ProfileJoin, ProfileTable,
};
use siteclust_core::{
    AggregateSpec, BinSpec, ClusterSettings, ClusterStageSpec, Quantiles, SiteRecord, SiteTable,
};

const DAY: [f64; 4] = [0.0, 0.8, 0.9, 0.1];
const NIGHT: [f64; 4] = [0.7, 0.1, 0.0, 0.9];

fn run(table: &SiteTable, settings: &ClusterSettings) -> ClusterRun {
    assign_site_clusters(table, settings, None, &ClusterMethodRegistry::with_defaults())
        .expect("pipeline run")
}

/// Eight sites in two cost bands, alternating day- and night-peaking profiles.
fn banded_sites() -> SiteTable {
    let costs = [1.0, 2.0, 3.0, 4.0, 10.0, 11.0, 12.0, 13.0];
    costs
        .iter()
        .enumerate()
        .map(|(i, cost)| {
            let profile = if i % 2 == 0 { DAY } else { NIGHT };
            SiteRecord::new(format!("s{i}"), "PJM", 10.0 + i as f64)
                .with_cost(*cost)
                .with_profile(profile.to_vec())
        })
        .collect()
}

fn labels(run: &ClusterRun) -> Vec<u32> {
    run.table.iter().map(|r| r.cluster.unwrap()).collect()
}

fn banded_settings() -> ClusterSettings {
    let mut settings = ClusterSettings::for_regions(&["PJM"]);
    settings.bin.push(BinSpec {
        feature: "lcoe".into(),
        bins: None,
        q: Some(Quantiles::Count(2)),
    });
    settings.cluster.push(ClusterStageSpec::new("profile", 2));
    settings.aggregate = Some(AggregateSpec::default());
    settings
}

/// Two cost bins with two profile clusters each give four labels, none shared.
#[test]
fn test_bins_times_profile_clusters() {
    let out = run(&banded_sites(), &banded_settings());
    assert_eq!(labels(&out), vec![1, 2, 1, 2, 3, 4, 3, 4]);
    assert_eq!(out.cluster_count(), 4);
}

/// Summed capacity of the summaries equals the capacity of the labelled sites.
#[test]
fn test_capacity_is_conserved_through_aggregation() {
    let sites = banded_sites();
    let out = run(&sites, &banded_settings());
    let summaries = out.summaries.as_ref().unwrap();
    let aggregated: f64 = summaries.iter().map(|s| s.sums["capacity_mw"]).sum();
    assert!((aggregated - sites.total_capacity_mw()).abs() < 1e-9);
    assert_eq!(summaries.iter().map(|s| s.site_count).sum::<usize>(), sites.len());
    for summary in summaries {
        let profile = summary.profile.as_ref().unwrap();
        assert_eq!(profile.len(), DAY.len());
    }
}

/// Labels are unique per cluster and contiguous from 1.
#[test]
fn test_labels_are_contiguous_and_unique() {
    let mut settings = banded_settings();
    settings.group.push("state".into());
    let sites: SiteTable = banded_sites()
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.with_attribute("state", if i < 6 { "VA" } else { "MD" }))
        .collect();
    let out = run(&sites, &settings);
    let distinct: BTreeSet<u32> = labels(&out).into_iter().collect();
    let expected: BTreeSet<u32> = (1..=distinct.len() as u32).collect();
    assert_eq!(distinct, expected);
    assert_eq!(out.assignment().len(), sites.len());
}

/// A group with a single site gets its own cluster.
#[test]
fn test_single_site_group_is_its_own_cluster() {
    let sites = SiteTable::new(vec![
        SiteRecord::new("a", "R", 1.0).with_cost(1.0).with_attribute("state", "VA"),
        SiteRecord::new("b", "R", 1.0).with_cost(2.0).with_attribute("state", "VA"),
        SiteRecord::new("c", "R", 1.0).with_cost(3.0).with_attribute("state", "MD"),
    ]);
    let mut settings = ClusterSettings::for_regions(&["R"]);
    settings.group.push("state".into());
    settings.cluster.push(ClusterStageSpec::new("cost", 1));
    let out = run(&sites, &settings);
    // MD sorts before VA.
    assert_eq!(labels(&out), vec![2, 2, 1]);
}

/// Asking for more clusters than sites yields one cluster per site.
#[test]
fn test_oversized_cluster_count_gives_singletons() {
    let sites = SiteTable::new(vec![
        SiteRecord::new("a", "R", 1.0).with_cost(1.0),
        SiteRecord::new("b", "R", 1.0).with_cost(2.0),
        SiteRecord::new("c", "R", 1.0).with_cost(3.0),
    ]);
    let mut settings = ClusterSettings::for_regions(&["R"]);
    settings.cluster.push(ClusterStageSpec::new("cost", 10));
    let out = run(&sites, &settings);
    assert_eq!(labels(&out), vec![1, 2, 3]);
    assert_eq!(out.diagnostics.issues_by_category("clustering").count(), 1);
}

/// Capacities 3 and 1 with profiles [2, 4] and [0, 0] average to [1.5, 3.0].
#[test]
fn test_capacity_weighted_profile() {
    let sites = SiteTable::new(vec![
        SiteRecord::new("a", "R", 3.0).with_profile(vec![2.0, 4.0]),
        SiteRecord::new("b", "R", 1.0).with_profile(vec![0.0, 0.0]),
    ]);
    let mut settings = ClusterSettings::for_regions(&["R"]);
    settings.cluster.push(ClusterStageSpec::new("profile", 1));
    settings.aggregate = Some(AggregateSpec::default());
    let out = run(&sites, &settings);
    let summaries = out.summaries.unwrap();
    assert_eq!(summaries.len(), 1);
    let profile = summaries[0].profile.as_ref().unwrap();
    assert!((profile[0] - 1.5).abs() < 1e-12);
    assert!((profile[1] - 3.0).abs() < 1e-12);
}

/// Merit-order selection keeps the cheapest sites through the one that
/// crosses the target.
#[test]
fn test_min_capacity_selection() {
    let sites = SiteTable::new(vec![
        SiteRecord::new("3", "R", 2.0).with_cost(3.0),
        SiteRecord::new("1", "R", 2.0).with_cost(1.0),
        SiteRecord::new("2", "R", 2.0).with_cost(2.0),
    ]);
    let mut settings = ClusterSettings::for_regions(&["R"]);
    settings.min_capacity = Some(3.0);
    let out = run(&sites, &settings);
    let kept: Vec<&str> = out.table.iter().map(|r| r.site_id.as_str()).collect();
    assert_eq!(kept, vec!["1", "2"]);
}

/// Without cluster stages each bin becomes one cluster.
#[test]
fn test_quantile_bins_without_stages() {
    let sites: SiteTable = [1.0, 2.0, 3.0, 8.0, 9.0]
        .iter()
        .enumerate()
        .map(|(i, cost)| SiteRecord::new(i.to_string(), "R", 1.0).with_cost(*cost))
        .collect();
    let mut settings = ClusterSettings::for_regions(&["R"]);
    settings.bin.push(BinSpec {
        feature: "cost".into(),
        bins: None,
        q: Some(Quantiles::Count(2)),
    });
    let out = run(&sites, &settings);
    assert_eq!(labels(&out), vec![1, 1, 1, 2, 2]);
}

/// Sites borrow profiles through the site map, shifted by the UTC offset.
#[test]
fn test_profiles_join_through_site_map() {
    let source: ProfileTable = [
        ("grid_1".to_string(), vec![1.0, 2.0, 3.0]),
        ("grid_2".to_string(), vec![3.0, 2.0, 1.0]),
    ]
    .into_iter()
    .collect();
    let site_map: HashMap<String, String> = [("a", "grid_1"), ("b", "grid_2"), ("c", "grid_1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let sites = SiteTable::new(vec![
        SiteRecord::new("a", "R", 1.0),
        SiteRecord::new("b", "R", 1.0),
        SiteRecord::new("c", "R", 1.0),
    ]);
    let mut settings = ClusterSettings::for_regions(&["R"]);
    settings.utc_offset = 1;
    settings.cluster.push(ClusterStageSpec::new("profile", 2));

    let join = ProfileJoin::new(&source).with_site_map(&site_map);
    let out = assign_site_clusters(
        &sites,
        &settings,
        Some(&join),
        &ClusterMethodRegistry::with_defaults(),
    )
    .unwrap();
    assert_eq!(out.table.records[0].profile, Some(vec![3.0, 1.0, 2.0]));
    assert_eq!(labels(&out), vec![1, 2, 1]);
}

/// Settings parsed from JSON drive a capacity-based cluster count.
#[test]
fn test_json_settings_with_mw_per_cluster() {
    let settings: ClusterSettings = serde_json::from_str(
        r#"{
            "regions": ["R"],
            "filter": [{"feature": "lcoe", "max": 50}],
            "cluster": [{"feature": "cost", "mw_per_cluster": 15}],
            "aggregate": {"means": ["cost"]}
        }"#,
    )
    .unwrap();
    let sites: SiteTable = [5.0, 6.0, 40.0, 41.0, 99.0]
        .iter()
        .enumerate()
        .map(|(i, cost)| SiteRecord::new(i.to_string(), "R", 10.0).with_cost(*cost))
        .collect();
    let out = run(&sites, &settings);
    // 40 MW survive the filter: floor(40 / 15) + 1 = 3 clusters.
    assert_eq!(out.table.len(), 4);
    assert_eq!(out.cluster_count(), 3);
    let summaries = out.summaries.unwrap();
    assert_eq!(summaries.len(), 3);
    assert!(summaries.iter().all(|s| s.sums.contains_key("capacity_mw")));
}
