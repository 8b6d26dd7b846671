//! Typed settings for one reduction run.
//!
//! A settings file holds one or more [`ClusterSettings`] groups (typically one
//! per technology and model region). YAML and JSON are both accepted:
//!
//! ```yaml
//! groups:
//!   - name: solar_pjm
//!     regions: [PJM_East, PJM_West]
//!     filter:
//!       - {feature: lcoe, max: 80}
//!     min_capacity: 5000
//!     bin:
//!       - {feature: lcoe, q: 3}
//!     group: [state]
//!     cluster:
//!       - {feature: profile, n_clusters: 2}
//!     aggregate: {}
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::site::{CAPACITY_COL, COST_COL};

/// Keep rows whose `feature` lies inside the inclusive `[min, max]` range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub feature: String,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
}

/// Bin edges: a bin count (equal-width over the data range) or explicit edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinEdges {
    Count(usize),
    Edges(Vec<f64>),
}

/// Quantiles: a count of equal-probability bins or explicit fractions in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantiles {
    Count(usize),
    Fractions(Vec<f64>),
}

/// Split rows into discrete bins by a numeric feature. `q` wins over `bins`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub feature: String,
    #[serde(default)]
    pub bins: Option<BinEdges>,
    #[serde(default)]
    pub q: Option<Quantiles>,
}

/// Linkage criterion for agglomerative clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum increase in within-cluster variance
    #[default]
    Ward,
    Average,
    Complete,
    Single,
}

fn default_method() -> String {
    "agglomerative".to_string()
}

/// One clustering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStageSpec {
    /// Registry key of the clustering method
    #[serde(default = "default_method")]
    pub method: String,
    /// `profile` or the name of a numeric column
    pub feature: String,
    /// Requested clusters per group; values `<= 0` are coerced to 1
    #[serde(default)]
    pub n_clusters: Option<i64>,
    /// Derive `n_clusters = floor(total_mw / mw_per_cluster) + 1`
    #[serde(default)]
    pub mw_per_cluster: Option<f64>,
    #[serde(default)]
    pub linkage: Linkage,
}

impl ClusterStageSpec {
    pub fn new(feature: impl Into<String>, n_clusters: i64) -> Self {
        Self {
            method: default_method(),
            feature: feature.into(),
            n_clusters: Some(n_clusters),
            mw_per_cluster: None,
            linkage: Linkage::default(),
        }
    }

    pub fn per_capacity(feature: impl Into<String>, mw_per_cluster: f64) -> Self {
        Self {
            method: default_method(),
            feature: feature.into(),
            n_clusters: None,
            mw_per_cluster: Some(mw_per_cluster),
            linkage: Linkage::default(),
        }
    }
}

fn default_sums() -> Vec<String> {
    vec![CAPACITY_COL.to_string()]
}

fn default_means() -> Vec<String> {
    vec![COST_COL.to_string()]
}

fn default_weight() -> String {
    CAPACITY_COL.to_string()
}

/// How member rows collapse into one row per cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(default = "default_sums")]
    pub sums: Vec<String>,
    #[serde(default = "default_means")]
    pub means: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: String,
}

impl Default for AggregateSpec {
    fn default() -> Self {
        Self {
            sums: default_sums(),
            means: default_means(),
            weight: default_weight(),
        }
    }
}

/// Settings for one reduction of a site population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSettings {
    #[serde(default)]
    pub name: Option<String>,
    pub regions: Vec<String>,
    #[serde(default)]
    pub filter: Vec<FilterSpec>,
    /// Keep the cheapest sites until this much capacity is reached
    #[serde(default)]
    pub min_capacity: Option<f64>,
    #[serde(default)]
    pub bin: Vec<BinSpec>,
    /// Extra grouping columns applied after the bins
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub cluster: Vec<ClusterStageSpec>,
    /// Circular shift applied to every profile before clustering
    #[serde(default)]
    pub utc_offset: i64,
    /// Collapse each cluster into a single summary row
    #[serde(default)]
    pub aggregate: Option<AggregateSpec>,
}

impl ClusterSettings {
    pub fn for_regions(regions: &[&str]) -> Self {
        Self {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Name used in logs and output file names.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.regions.join("+"))
    }
}

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    pub version: Option<u32>,
    /// Wide profile table (one column per site key)
    #[serde(default)]
    pub profiles: Option<String>,
    /// Two-column `site_id,profile_key` remapping table
    #[serde(default)]
    pub site_map: Option<String>,
    /// Applied to groups that leave `utc_offset` at zero
    #[serde(default)]
    pub utc_offset: i64,
    #[serde(default)]
    pub groups: Vec<ClusterSettings>,
}

pub fn load_settings_from_path(path: &Path) -> Result<SettingsFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading settings '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing settings yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing settings json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing settings"),
    }
}

/// Validate the file and return its groups with file-level defaults applied.
pub fn resolve_groups(file: &SettingsFile) -> Result<Vec<ClusterSettings>> {
    if file.groups.is_empty() {
        return Err(anyhow!("settings contain no cluster groups"));
    }
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(file.groups.len());
    for group in &file.groups {
        let label = group.label();
        if group.regions.is_empty() {
            return Err(anyhow!("group '{}' must list at least one region", label));
        }
        if !seen.insert(label.clone()) {
            return Err(anyhow!("duplicate group name '{}' in settings", label));
        }
        for (idx, bin) in group.bin.iter().enumerate() {
            if bin.feature.trim().is_empty() {
                return Err(anyhow!(
                    "group '{}': bin spec #{} must name a numeric feature to split sites by",
                    label,
                    idx + 1
                ));
            }
        }
        for stage in &group.cluster {
            if stage.n_clusters.is_none() && stage.mw_per_cluster.is_none() {
                return Err(anyhow!(
                    "group '{}': cluster stage on '{}' needs n_clusters or mw_per_cluster",
                    label,
                    stage.feature
                ));
            }
        }
        let mut group = group.clone();
        if group.utc_offset == 0 {
            group.utc_offset = file.utc_offset;
        }
        resolved.push(group);
    }
    Ok(resolved)
}

pub fn validate(file: &SettingsFile) -> Result<()> {
    resolve_groups(file).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
utc_offset: -5
groups:
  - name: solar
    regions: [A, B]
    filter:
      - {feature: lcoe, max: 80}
    bin:
      - {feature: lcoe, q: 3}
      - {feature: area, bins: [0, 10, 20]}
    cluster:
      - {feature: profile, n_clusters: 2, linkage: average}
      - {feature: lcoe, mw_per_cluster: 500}
    aggregate: {}
"#;

    #[test]
    fn parses_yaml_settings_with_defaults() {
        let file: SettingsFile = serde_yaml::from_str(YAML).unwrap();
        let group = &file.groups[0];
        assert_eq!(group.filter[0].max, Some(80.0));
        assert_eq!(group.filter[0].min, None);
        assert_eq!(group.bin[0].q, Some(Quantiles::Count(3)));
        assert_eq!(
            group.bin[1].bins,
            Some(BinEdges::Edges(vec![0.0, 10.0, 20.0]))
        );
        assert_eq!(group.cluster[0].method, "agglomerative");
        assert_eq!(group.cluster[0].linkage, Linkage::Average);
        assert_eq!(group.cluster[1].linkage, Linkage::Ward);
        assert_eq!(group.aggregate, Some(AggregateSpec::default()));
    }

    #[test]
    fn resolve_applies_file_offset() {
        let file: SettingsFile = serde_yaml::from_str(YAML).unwrap();
        let groups = resolve_groups(&file).unwrap();
        assert_eq!(groups[0].utc_offset, -5);
    }

    #[test]
    fn resolve_rejects_stage_without_count() {
        let json = r#"{"groups":[{"regions":["A"],"cluster":[{"feature":"profile"}]}]}"#;
        let file: SettingsFile = serde_json::from_str(json).unwrap();
        let err = resolve_groups(&file).unwrap_err();
        assert!(err.to_string().contains("n_clusters or mw_per_cluster"));
    }

    #[test]
    fn resolve_rejects_duplicate_names_and_empty_regions() {
        let file = SettingsFile {
            groups: vec![ClusterSettings::for_regions(&["A"]), ClusterSettings::for_regions(&["A"])],
            ..SettingsFile::default()
        };
        assert!(resolve_groups(&file).is_err());

        let file = SettingsFile {
            groups: vec![ClusterSettings::default()],
            ..SettingsFile::default()
        };
        assert!(resolve_groups(&file).is_err());
    }

    #[test]
    fn loads_settings_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"groups":[{"regions":["A"]}]}"#).unwrap();
        let file = load_settings_from_path(&path).unwrap();
        assert_eq!(file.groups[0].label(), "A");
        assert!(validate(&file).is_ok());
    }
}
