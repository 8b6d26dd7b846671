use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use siteclust_algo::ProfileTable;
use tracing::info;

use crate::{column_f64, column_text, read_frame};

/// Load a wide profile table: one column per profile key, one row per hour.
///
/// Every value must be present; all profiles share the table's row count.
pub fn load_profiles(path: &Path) -> Result<ProfileTable> {
    let df = read_frame(path)?;
    let mut profiles = ProfileTable::new();
    for series in df.get_columns() {
        let key = series.name().trim().to_string();
        let values = column_f64(series)?
            .into_iter()
            .enumerate()
            .map(|(hour, value)| {
                value.ok_or_else(|| {
                    anyhow!("profile '{}' has no value at row {}", key, hour + 1)
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        profiles.insert(key, values);
    }
    info!(
        path = %path.display(),
        profiles = profiles.len(),
        hours = df.height(),
        "loaded generation profiles"
    );
    Ok(profiles)
}

/// Load a `site_id -> profile key` map from the first two columns of a table.
pub fn load_site_map(path: &Path) -> Result<HashMap<String, String>> {
    let df = read_frame(path)?;
    if df.width() < 2 {
        bail!(
            "site map {} needs two columns (site id, profile key)",
            path.display()
        );
    }
    let columns = df.get_columns();
    let sites = column_text(&columns[0])?;
    let keys = column_text(&columns[1])?;

    let mut map = HashMap::with_capacity(df.height());
    for (row, (site, key)) in sites.into_iter().zip(keys).enumerate() {
        match (site, key) {
            (Some(site), Some(key)) => {
                if let Some(previous) = map.insert(site.clone(), key.clone()) {
                    if previous != key {
                        bail!(
                            "site '{}' maps to both '{}' and '{}' in {}",
                            site,
                            previous,
                            key,
                            path.display()
                        );
                    }
                }
            }
            _ => bail!("row {} of {} is incomplete", row + 1, path.display()),
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn wide_profiles_load_by_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.csv");
        fs::write(&path, "1,2\n0.1,0.5\n0.2,0.6\n0.3,0.7\n").unwrap();
        let profiles = load_profiles(&path).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles.get("1"), Some(&[0.1, 0.2, 0.3][..]));
        assert_eq!(profiles.get("2"), Some(&[0.5, 0.6, 0.7][..]));
    }

    #[test]
    fn gaps_in_profiles_are_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.csv");
        fs::write(&path, "a,b\n0.1,0.5\n,0.6\n").unwrap();
        assert!(load_profiles(&path).is_err());
    }

    #[test]
    fn site_map_uses_first_two_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.csv");
        fs::write(&path, "cpa_id,profile_key\n101,7\n102,7\n").unwrap();
        let map = load_site_map(&path).unwrap();
        assert_eq!(map.get("101").map(String::as_str), Some("7"));
        assert_eq!(map.len(), 2);

        fs::write(&path, "cpa_id,profile_key\n101,7\n101,8\n").unwrap();
        assert!(load_site_map(&path).is_err());
    }
}
