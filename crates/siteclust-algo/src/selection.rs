//! Merit-order capacity selection.
//!
//! Sites are taken cheapest first until their cumulative capacity reaches a
//! target. The site that crosses the target is kept, so the selection holds at
//! least the target capacity and overshoots by at most one site.

use std::cmp::Ordering;

use siteclust_core::{Diagnostics, SiteTable, COST_COL};
use tracing::info;

/// Keep the cheapest sites whose cumulative capacity first reaches `target_mw`.
///
/// - No target (or a non-positive one): the table is returned unchanged.
/// - No site carries a cost: a warning is recorded and the table is returned
///   unchanged.
/// - Target never reached: every site is kept, in merit order.
///
/// Sites without a cost sort after every priced site.
pub fn select_min_capacity(
    table: SiteTable,
    target_mw: Option<f64>,
    diag: &mut Diagnostics,
) -> SiteTable {
    let Some(target) = target_mw.filter(|t| *t > 0.0) else {
        return table;
    };
    if table.feature_kind(COST_COL).is_none() {
        diag.add_warning_with_entity(
            "selection",
            "a minimum capacity was requested but the site data has no cost column; \
             all sites are kept",
            COST_COL,
        );
        return table;
    }

    let mut records = table.into_records();
    let before = records.len();
    records.sort_by(|a, b| match (a.cost, b.cost) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut cumulative = 0.0;
    let mut keep = records.len();
    for (idx, record) in records.iter().enumerate() {
        cumulative += record.capacity_mw;
        if cumulative >= target {
            keep = idx + 1;
            break;
        }
    }
    records.truncate(keep);

    info!(
        target_mw = target,
        selected_mw = cumulative,
        before,
        after = records.len(),
        "merit-order capacity selection"
    );
    SiteTable::new(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteclust_core::SiteRecord;

    fn priced(entries: &[(&str, f64, f64)]) -> SiteTable {
        entries
            .iter()
            .map(|(id, cost, mw)| SiteRecord::new(*id, "R", *mw).with_cost(*cost))
            .collect()
    }

    fn ids(table: &SiteTable) -> Vec<&str> {
        table.iter().map(|r| r.site_id.as_str()).collect()
    }

    #[test]
    fn keeps_the_row_that_crosses_the_target() {
        let table = priced(&[("c", 3.0, 2.0), ("a", 1.0, 2.0), ("b", 2.0, 2.0)]);
        let mut diag = Diagnostics::new();
        let out = select_min_capacity(table, Some(3.0), &mut diag);
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert!(!diag.has_warnings());
    }

    #[test]
    fn exact_target_stops_at_that_row() {
        let table = priced(&[("a", 1.0, 2.0), ("b", 2.0, 2.0), ("c", 3.0, 2.0)]);
        let out = select_min_capacity(table, Some(4.0), &mut Diagnostics::new());
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn first_row_alone_can_satisfy_the_target() {
        let table = priced(&[("a", 1.0, 10.0), ("b", 2.0, 2.0)]);
        let out = select_min_capacity(table, Some(3.0), &mut Diagnostics::new());
        assert_eq!(ids(&out), vec!["a"]);
    }

    #[test]
    fn unreachable_target_keeps_all_sites_in_merit_order() {
        let table = priced(&[("b", 2.0, 1.0), ("a", 1.0, 1.0)]);
        let out = select_min_capacity(table, Some(100.0), &mut Diagnostics::new());
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn missing_cost_column_is_a_warning_and_a_no_op() {
        let table = SiteTable::new(vec![
            SiteRecord::new("b", "R", 1.0),
            SiteRecord::new("a", "R", 1.0),
        ]);
        let mut diag = Diagnostics::new();
        let out = select_min_capacity(table.clone(), Some(1.0), &mut diag);
        assert_eq!(out, table);
        assert_eq!(diag.issues_by_category("selection").count(), 1);
    }

    #[test]
    fn unset_target_is_a_no_op() {
        let table = priced(&[("b", 2.0, 1.0), ("a", 1.0, 1.0)]);
        let out = select_min_capacity(table.clone(), None, &mut Diagnostics::new());
        assert_eq!(out, table);
    }

    #[test]
    fn unpriced_sites_come_last() {
        let table = SiteTable::new(vec![
            SiteRecord::new("x", "R", 5.0),
            SiteRecord::new("a", "R", 1.0).with_cost(9.0),
        ]);
        let out = select_min_capacity(table, Some(3.0), &mut Diagnostics::new());
        assert_eq!(ids(&out), vec!["a", "x"]);
    }
}
