//! Candidate site records and the tables the pipeline passes between stages.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Column name of the built-in capacity field.
pub const CAPACITY_COL: &str = "capacity_mw";
/// Column name of the built-in cost field (levelized cost).
pub const COST_COL: &str = "cost";
/// Feature name that selects the generation profile instead of a scalar.
pub const PROFILE_COL: &str = "profile";

/// Lower-cases a feature name and maps the legacy aliases (`mw`, `lcoe`,
/// `cpa_id`, `ipm_region`) onto the built-in field names.
pub fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "mw" => CAPACITY_COL.to_string(),
        "lcoe" => COST_COL.to_string(),
        "cpa_id" => "site_id".to_string(),
        "ipm_region" => "region".to_string(),
        _ => lower,
    }
}

/// One cell of a grouping key.
///
/// Keys mix bin labels (integers), numeric group-by features, text group-by
/// features and cluster labels, so the ordering is total across variants:
/// numbers compare by value, then text, then missing values last.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Number(f64),
    Text(String),
    Missing,
}

impl KeyValue {
    fn rank(&self) -> u8 {
        match self {
            KeyValue::Int(_) | KeyValue::Number(_) => 0,
            KeyValue::Text(_) => 1,
            KeyValue::Missing => 2,
        }
    }

    /// Numeric view of the key, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeyValue::Int(v) => Some(*v as f64),
            KeyValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Int(a), KeyValue::Int(b)) => a.cmp(b),
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Number(v) => write!(f, "{v}"),
            KeyValue::Text(v) => write!(f, "{v}"),
            KeyValue::Missing => write!(f, "<missing>"),
        }
    }
}

/// Whether a column holds numbers or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    Text,
}

/// One candidate project area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: String,
    pub region: String,
    pub capacity_mw: f64,
    #[serde(default)]
    pub cost: Option<f64>,
    /// Additional numeric columns, keyed by lower-case name
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    /// Additional text columns (state, metro id, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub profile: Option<Vec<f64>>,
    /// Derived grouping columns (`<feature>_bin`, `<feature>_clust`)
    #[serde(default)]
    pub keys: BTreeMap<String, KeyValue>,
    #[serde(default)]
    pub cluster: Option<u32>,
}

impl SiteRecord {
    pub fn new(site_id: impl Into<String>, region: impl Into<String>, capacity_mw: f64) -> Self {
        Self {
            site_id: site_id.into(),
            region: region.into(),
            capacity_mw,
            cost: None,
            features: BTreeMap::new(),
            attributes: BTreeMap::new(),
            profile: None,
            keys: BTreeMap::new(),
            cluster: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(canonical_name(name), value);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(canonical_name(name), value.into());
        self
    }

    pub fn with_profile(mut self, profile: Vec<f64>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Numeric value of a named column for this record.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        let name = canonical_name(name);
        match name.as_str() {
            CAPACITY_COL => Some(self.capacity_mw),
            COST_COL => self.cost,
            _ => self
                .keys
                .get(&name)
                .and_then(KeyValue::as_f64)
                .or_else(|| self.features.get(&name).copied()),
        }
    }

    /// Value of a named column as a grouping key cell.
    pub fn key_value(&self, name: &str) -> KeyValue {
        let name = canonical_name(name);
        if let Some(key) = self.keys.get(&name) {
            return key.clone();
        }
        match name.as_str() {
            "site_id" => KeyValue::Text(self.site_id.clone()),
            "region" => KeyValue::Text(self.region.clone()),
            _ => {
                if let Some(value) = self.numeric(&name) {
                    KeyValue::Number(value)
                } else if let Some(text) = self.attributes.get(&name) {
                    KeyValue::Text(text.clone())
                } else {
                    KeyValue::Missing
                }
            }
        }
    }
}

/// A table of site records.
///
/// Stages consume a table and return a new one; records are moved, never
/// edited behind the caller's back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteTable {
    pub records: Vec<SiteRecord>,
}

impl SiteTable {
    pub fn new(records: Vec<SiteRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SiteRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<SiteRecord> {
        self.records
    }

    pub fn total_capacity_mw(&self) -> f64 {
        self.records.iter().map(|r| r.capacity_mw).sum()
    }

    /// Kind of a column, or `None` when no record carries it.
    ///
    /// The built-in capacity, region and id columns always exist; optional
    /// columns exist when at least one record carries a value.
    pub fn feature_kind(&self, name: &str) -> Option<FeatureKind> {
        let name = canonical_name(name);
        match name.as_str() {
            CAPACITY_COL => return Some(FeatureKind::Numeric),
            "site_id" | "region" => return Some(FeatureKind::Text),
            COST_COL => {
                return self
                    .records
                    .iter()
                    .any(|r| r.cost.is_some())
                    .then_some(FeatureKind::Numeric)
            }
            PROFILE_COL => return None,
            _ => {}
        }
        if self.records.iter().any(|r| {
            r.features.contains_key(&name)
                || r.keys.get(&name).and_then(KeyValue::as_f64).is_some()
        }) {
            Some(FeatureKind::Numeric)
        } else if self
            .records
            .iter()
            .any(|r| r.attributes.contains_key(&name) || r.keys.contains_key(&name))
        {
            Some(FeatureKind::Text)
        } else {
            None
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        if canonical_name(name) == PROFILE_COL {
            return self.has_profiles();
        }
        self.feature_kind(name).is_some()
    }

    pub fn has_profiles(&self) -> bool {
        self.records.iter().any(|r| r.profile.is_some())
    }

    /// Distinct regions present, sorted.
    pub fn regions(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Copy of the rows whose region is in `regions`.
    pub fn restrict_regions(&self, regions: &[String]) -> SiteTable {
        self.records
            .iter()
            .filter(|r| regions.iter().any(|region| region == &r.region))
            .cloned()
            .collect()
    }

    /// `site_id -> cluster` for every labelled record.
    pub fn cluster_assignment(&self) -> BTreeMap<String, u32> {
        self.records
            .iter()
            .filter_map(|r| r.cluster.map(|c| (r.site_id.clone(), c)))
            .collect()
    }

    /// Distinct cluster labels in ascending order.
    pub fn cluster_labels(&self) -> Vec<u32> {
        self.records
            .iter()
            .filter_map(|r| r.cluster)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl FromIterator<SiteRecord> for SiteTable {
    fn from_iter<I: IntoIterator<Item = SiteRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SiteTable {
    type Item = SiteRecord;
    type IntoIter = std::vec::IntoIter<SiteRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// One aggregated cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: u32,
    /// Shared region of all members, if they agree
    pub region: Option<String>,
    pub site_count: usize,
    pub sums: BTreeMap<String, f64>,
    pub means: BTreeMap<String, f64>,
    /// Weighted mean profile; only set when every member carries one
    #[serde(default)]
    pub profile: Option<Vec<f64>>,
}
