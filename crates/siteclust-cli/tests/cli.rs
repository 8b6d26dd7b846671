use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

const SITES: &str = "\
cpa_id,ipm_region,mw,lcoe,state
1,PJM_East,100,30,VA
2,PJM_East,50,32,VA
3,PJM_East,80,70,MD
4,PJM_East,20,72,MD
5,PJM_West,40,45,OH
";

const PROFILES: &str = "\
p1,p2
0.0,0.9
0.8,0.1
0.9,0.0
0.1,0.8
";

const SITE_MAP: &str = "\
cpa_id,profile_key
1,p1
2,p2
3,p1
4,p2
5,p1
";

const SETTINGS: &str = r#"
profiles: profiles.csv
site_map: site_map.csv
groups:
  - name: east
    regions: [PJM_East]
    bin:
      - {feature: lcoe, bins: [0, 50, 100]}
    cluster:
      - {feature: profile, n_clusters: 1}
    aggregate:
      sums: [capacity_mw]
      means: [cost]
"#;

fn write_inputs(dir: &std::path::Path) {
    fs::write(dir.join("sites.csv"), SITES).unwrap();
    fs::write(dir.join("profiles.csv"), PROFILES).unwrap();
    fs::write(dir.join("site_map.csv"), SITE_MAP).unwrap();
    fs::write(dir.join("settings.yaml"), SETTINGS).unwrap();
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("siteclust")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("summary"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn run_writes_clusters_summary_and_profiles() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let out = dir.path().join("out");

    Command::cargo_bin("siteclust")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "run",
            "--sites",
            "sites.csv",
            "--settings",
            "settings.yaml",
            "--out",
            "out/clusters.csv",
            "--summary-out",
            "out/summary.csv",
            "--profiles-out",
            "out/profiles.csv",
            "--diagnostics-out",
            "out/diagnostics.json",
            "--threads",
            "2",
        ])
        .assert()
        .success();

    let clusters = fs::read_to_string(out.join("clusters.csv")).unwrap();
    assert_eq!(clusters.lines().count(), 5);
    assert!(clusters.lines().next().unwrap().contains("cluster"));
    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 3);
    assert!(out.join("profiles.csv").exists());
    let diagnostics = fs::read_to_string(out.join("diagnostics.json")).unwrap();
    assert!(diagnostics.contains("\"group\": \"east\""));
}

#[test]
fn run_with_two_groups_writes_one_file_per_group() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(
        dir.path().join("two.yaml"),
        r#"
groups:
  - name: east
    regions: [PJM_East]
    cluster:
      - {feature: cost, n_clusters: 2}
  - name: west
    regions: [PJM_West]
"#,
    )
    .unwrap();

    Command::cargo_bin("siteclust")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "run",
            "--sites",
            "sites.csv",
            "--settings",
            "two.yaml",
            "--out",
            "clusters.csv",
        ])
        .assert()
        .success();

    assert!(dir.path().join("clusters_east.csv").exists());
    assert!(dir.path().join("clusters_west.csv").exists());
    assert!(!dir.path().join("clusters.csv").exists());
}

#[test]
fn run_fails_on_missing_sites_file() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    Command::cargo_bin("siteclust")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "run",
            "--sites",
            "nope.csv",
            "--settings",
            "settings.yaml",
            "--out",
            "clusters.csv",
        ])
        .assert()
        .failure();
}

#[test]
fn summary_prints_region_table() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    Command::cargo_bin("siteclust")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "summary",
            "--sites",
            "sites.csv",
            "--out",
            "bins.csv",
            "--edges",
            "0,50,100",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("PJM_East"))
        .stdout(predicate::str::contains("(0, 50]"));
    let bins = fs::read_to_string(dir.path().join("bins.csv")).unwrap();
    // header, two bands and the unbinned row for each of two regions
    assert_eq!(bins.lines().count(), 1 + 2 * 3);
}

#[test]
fn validate_reports_groups_and_rejects_empty_settings() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    Command::cargo_bin("siteclust")
        .unwrap()
        .args(["validate", "--settings"])
        .arg(dir.path().join("settings.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 group(s) OK"))
        .stdout(predicate::str::contains("east"));

    fs::write(dir.path().join("empty.yaml"), "groups: []\n").unwrap();
    Command::cargo_bin("siteclust")
        .unwrap()
        .args(["validate", "--settings"])
        .arg(dir.path().join("empty.yaml"))
        .assert()
        .failure();
}
