//! Generation profiles: where they come from and how they attach to sites.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use siteclust_core::{ClusterError, ClusterResult, SiteTable};
use tracing::info;

/// Supplies one time series per lookup key.
pub trait ProfileSource: Send + Sync {
    /// Return the profile of every requested key. A key the source does not
    /// know is an error.
    fn load_profiles(&self, keys: &[String]) -> ClusterResult<HashMap<String, Vec<f64>>>;
}

/// In-memory profiles keyed by site lookup key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileTable {
    profiles: BTreeMap<String, Vec<f64>>,
}

impl ProfileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, profile: Vec<f64>) {
        self.profiles.insert(key.into(), profile);
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.profiles.get(key).map(|p| p.as_slice())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|k| k.as_str())
    }
}

impl FromIterator<(String, Vec<f64>)> for ProfileTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().collect(),
        }
    }
}

impl ProfileSource for ProfileTable {
    fn load_profiles(&self, keys: &[String]) -> ClusterResult<HashMap<String, Vec<f64>>> {
        keys.iter()
            .map(|key| {
                self.profiles
                    .get(key)
                    .map(|p| (key.clone(), p.clone()))
                    .ok_or_else(|| {
                        ClusterError::Profile(format!("no profile found for site key '{}'", key))
                    })
            })
            .collect()
    }
}

/// Circularly shift a profile by `offset` steps; positive moves values later.
pub fn shift_profile(mut profile: Vec<f64>, offset: i64) -> Vec<f64> {
    let len = profile.len();
    if len == 0 {
        return profile;
    }
    let steps = offset.rem_euclid(len as i64) as usize;
    profile.rotate_right(steps);
    profile
}

/// Profile source plus the optional `site_id -> profile key` remapping.
#[derive(Clone, Copy)]
pub struct ProfileJoin<'a> {
    pub source: &'a dyn ProfileSource,
    pub site_map: Option<&'a HashMap<String, String>>,
}

impl<'a> ProfileJoin<'a> {
    pub fn new(source: &'a dyn ProfileSource) -> Self {
        Self {
            source,
            site_map: None,
        }
    }

    pub fn with_site_map(mut self, site_map: &'a HashMap<String, String>) -> Self {
        self.site_map = Some(site_map);
        self
    }

    fn lookup_key(&self, site_id: &str) -> ClusterResult<String> {
        match self.site_map {
            Some(map) => map.get(site_id).cloned().ok_or_else(|| {
                ClusterError::Profile(format!("site '{}' has no entry in the site map", site_id))
            }),
            None => Ok(site_id.to_string()),
        }
    }
}

/// Attach a shifted profile to every site.
///
/// All profiles in the result share one length; a mismatch is a validation
/// error naming the first offending site.
pub fn attach_profiles(
    table: SiteTable,
    join: &ProfileJoin<'_>,
    utc_offset: i64,
) -> ClusterResult<SiteTable> {
    let lookup: Vec<String> = table
        .iter()
        .map(|r| join.lookup_key(&r.site_id))
        .collect::<ClusterResult<_>>()?;
    let unique: Vec<String> = lookup
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let loaded = join.source.load_profiles(&unique)?;
    info!(
        sites = table.len(),
        profiles = loaded.len(),
        utc_offset,
        "attaching generation profiles"
    );

    let mut expected_len: Option<usize> = None;
    let mut records = Vec::with_capacity(table.len());
    for (mut record, key) in table.into_iter().zip(lookup) {
        let profile = loaded.get(&key).cloned().ok_or_else(|| {
            ClusterError::Profile(format!("profile source returned nothing for key '{}'", key))
        })?;
        match expected_len {
            None => expected_len = Some(profile.len()),
            Some(len) if len != profile.len() => {
                return Err(ClusterError::Validation(format!(
                    "profile for site '{}' has {} values, expected {}",
                    record.site_id,
                    profile.len(),
                    len
                )));
            }
            Some(_) => {}
        }
        record.profile = Some(shift_profile(profile, utc_offset));
        records.push(record);
    }
    Ok(SiteTable::new(records))
}
