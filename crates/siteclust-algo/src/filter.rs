//! Inclusive range filters on a single feature.

use siteclust_core::{FilterSpec, SiteTable};
use tracing::debug;

/// Keep the rows whose `spec.feature` satisfies every supplied bound.
///
/// Bounds are inclusive and independent; an absent bound imposes nothing.
/// A row without a value for the feature fails any supplied bound.
pub fn value_filter(table: SiteTable, spec: &FilterSpec) -> SiteTable {
    if spec.max.is_none() && spec.min.is_none() {
        return table;
    }
    let before = table.len();
    let kept: SiteTable = table
        .into_iter()
        .filter(|record| {
            let Some(value) = record.numeric(&spec.feature) else {
                return false;
            };
            spec.max.map_or(true, |max| value <= max) && spec.min.map_or(true, |min| value >= min)
        })
        .collect();
    debug!(
        feature = %spec.feature,
        max = ?spec.max,
        min = ?spec.min,
        before,
        after = kept.len(),
        "applied value filter"
    );
    kept
}
