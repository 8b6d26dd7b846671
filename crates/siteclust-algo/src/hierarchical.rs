//! Agglomerative (hierarchical) clustering.
//!
//! Builds the full dendrogram with the nearest-neighbour chain algorithm and
//! Lance–Williams distance updates, then cuts it at `k` clusters. All four
//! supported linkages are reducible, so the chain finds the same merges as the
//! naive O(n³) search in O(n²) time and O(n²/2) memory.
//!
//! | Linkage | Stored distance | Update |
//! |---------|-----------------|--------|
//! | Ward | squared Euclidean | variance increase |
//! | Average | Euclidean | size-weighted mean |
//! | Complete | Euclidean | max |
//! | Single | Euclidean | min |
//!
//! Labels are 1-based and numbered in order of first appearance, so the
//! result depends only on the item order.

use rayon::prelude::*;
use siteclust_core::{ClusterError, ClusterResult, Linkage};

/// Upper-triangular pairwise distance matrix.
struct CondensedMatrix {
    n: usize,
    data: Vec<f64>,
}

impl CondensedMatrix {
    fn build(points: &[&[f64]], linkage: Linkage) -> Self {
        let n = points.len();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| {
                        let sq = squared_euclidean(points[i], points[j]);
                        match linkage {
                            Linkage::Ward => sq,
                            _ => sq.sqrt(),
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            n,
            data: rows.concat(),
        }
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.n * i - i * (i + 1) / 2 + (j - i - 1)
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.index(i, j)]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.index(i, j);
        self.data[idx] = value;
    }
}

fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// One dendrogram merge, identified by a representative item of each side.
#[derive(Debug, Clone, Copy)]
struct Merge {
    a: usize,
    b: usize,
    height: f64,
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

fn lance_williams(
    linkage: Linkage,
    d_ax: f64,
    d_bx: f64,
    d_ab: f64,
    n_a: f64,
    n_b: f64,
    n_x: f64,
) -> f64 {
    match linkage {
        Linkage::Single => d_ax.min(d_bx),
        Linkage::Complete => d_ax.max(d_bx),
        Linkage::Average => (n_a * d_ax + n_b * d_bx) / (n_a + n_b),
        Linkage::Ward => {
            ((n_a + n_x) * d_ax + (n_b + n_x) * d_bx - n_x * d_ab) / (n_a + n_b + n_x)
        }
    }
}

/// Full merge sequence, sorted by height.
fn dendrogram(points: &[&[f64]], linkage: Linkage) -> Vec<Merge> {
    let n = points.len();
    let mut dist = CondensedMatrix::build(points, linkage);
    let mut size = vec![1usize; n];
    let mut active = vec![true; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for _ in 1..n {
        if chain.is_empty() {
            if let Some(first) = active.iter().position(|&alive| alive) {
                chain.push(first);
            }
        }

        let (a, b, height) = loop {
            let a = chain[chain.len() - 1];
            let prev = (chain.len() >= 2).then(|| chain[chain.len() - 2]);

            // Ties keep the previous chain element, which guarantees termination.
            let mut best = prev;
            let mut best_d = prev.map(|p| dist.get(a, p)).unwrap_or(f64::INFINITY);
            for x in 0..n {
                if !active[x] || x == a {
                    continue;
                }
                let d = dist.get(a, x);
                if best.is_none() || d < best_d {
                    best = Some(x);
                    best_d = d;
                }
            }

            let Some(b) = best else {
                unreachable!("at least two active clusters remain while merging");
            };
            if prev == Some(b) {
                chain.truncate(chain.len() - 2);
                break (a, b, best_d);
            }
            chain.push(b);
        };

        // The merged cluster lives on in slot `b`.
        let (n_a, n_b) = (size[a] as f64, size[b] as f64);
        for x in 0..n {
            if !active[x] || x == a || x == b {
                continue;
            }
            let updated = lance_williams(
                linkage,
                dist.get(a, x),
                dist.get(b, x),
                height,
                n_a,
                n_b,
                size[x] as f64,
            );
            dist.set(b, x, updated);
        }
        active[a] = false;
        size[b] += size[a];
        merges.push(Merge { a, b, height });
    }

    merges.sort_by(|l, r| l.height.total_cmp(&r.height));
    merges
}

/// Partition `points` into `n_clusters` groups.
///
/// `n_clusters` is clamped to `[1, points.len()]`; callers that need to report
/// the clamp do so before calling. Every point must have the same dimension
/// and only finite coordinates.
pub fn agglomerative(
    points: &[&[f64]],
    n_clusters: usize,
    linkage: Linkage,
) -> ClusterResult<Vec<u32>> {
    let n = points.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let dim = points[0].len();
    for (idx, point) in points.iter().enumerate() {
        if point.len() != dim {
            return Err(ClusterError::Validation(format!(
                "item {} has {} values, expected {}",
                idx,
                point.len(),
                dim
            )));
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(ClusterError::Validation(format!(
                "item {} contains a non-finite value",
                idx
            )));
        }
    }

    let k = n_clusters.clamp(1, n);
    if k == n {
        return Ok((1..=n as u32).collect());
    }

    let merges = dendrogram(points, linkage);
    let mut sets = DisjointSet::new(n);
    for merge in merges.iter().take(n - k) {
        sets.union(merge.a, merge.b);
    }

    let mut labels = Vec::with_capacity(n);
    let mut root_labels: Vec<Option<u32>> = vec![None; n];
    let mut next = 1u32;
    for item in 0..n {
        let root = sets.find(item);
        let label = *root_labels[root].get_or_insert_with(|| {
            next += 1;
            next - 1
        });
        labels.push(label);
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars(values: &[f64]) -> Vec<Vec<f64>> {
        values.iter().map(|v| vec![*v]).collect()
    }

    fn run(points: &[Vec<f64>], k: usize, linkage: Linkage) -> Vec<u32> {
        let refs: Vec<&[f64]> = points.iter().map(|p| p.as_slice()).collect();
        agglomerative(&refs, k, linkage).unwrap()
    }

    #[test]
    fn separates_two_obvious_groups_for_every_linkage() {
        let points = scalars(&[1.0, 10.0, 2.0, 11.0, 1.5]);
        for linkage in [
            Linkage::Ward,
            Linkage::Average,
            Linkage::Complete,
            Linkage::Single,
        ] {
            assert_eq!(run(&points, 2, linkage), vec![1, 2, 1, 2, 1], "{linkage:?}");
        }
    }

    #[test]
    fn single_linkage_chains_where_complete_does_not() {
        // Evenly spaced chain plus a distant point: single linkage keeps the
        // chain whole, complete linkage splits it before absorbing the outlier.
        let points = scalars(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        assert_eq!(run(&points, 2, Linkage::Single), vec![1, 1, 1, 1, 1, 1, 2]);
        assert_eq!(run(&points, 3, Linkage::Complete)[6], 3);
    }

    #[test]
    fn ward_groups_profiles_by_shape() {
        let points = vec![
            vec![0.0, 0.2, 0.9, 0.3],
            vec![0.8, 0.9, 0.1, 0.0],
            vec![0.1, 0.3, 1.0, 0.2],
            vec![0.9, 0.8, 0.0, 0.1],
        ];
        assert_eq!(run(&points, 2, Linkage::Ward), vec![1, 2, 1, 2]);
    }

    #[test]
    fn cluster_count_is_exact() {
        let points = scalars(&[5.0, 3.0, 9.0, 1.0, 7.0, 2.0, 8.0, 4.0]);
        for k in 1..=points.len() {
            let labels = run(&points, k, Linkage::Ward);
            let mut distinct = labels.clone();
            distinct.sort_unstable();
            distinct.dedup();
            assert_eq!(distinct, (1..=k as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn k_is_clamped_to_item_range() {
        let points = scalars(&[1.0, 2.0, 3.0]);
        assert_eq!(run(&points, 0, Linkage::Ward), vec![1, 1, 1]);
        assert_eq!(run(&points, 10, Linkage::Ward), vec![1, 2, 3]);
    }

    #[test]
    fn identical_points_still_produce_k_clusters() {
        let points = scalars(&[4.0, 4.0, 4.0, 4.0]);
        let mut labels = run(&points, 2, Linkage::Average);
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels, vec![1, 2]);
    }

    #[test]
    fn rejects_ragged_and_non_finite_input() {
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        let refs: Vec<&[f64]> = ragged.iter().map(|p| p.as_slice()).collect();
        assert!(matches!(
            agglomerative(&refs, 1, Linkage::Ward),
            Err(ClusterError::Validation(_))
        ));

        let nan = vec![vec![1.0], vec![f64::NAN]];
        let refs: Vec<&[f64]> = nan.iter().map(|p| p.as_slice()).collect();
        assert!(agglomerative(&refs, 1, Linkage::Ward).is_err());
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(agglomerative(&[], 3, Linkage::Ward).unwrap().is_empty());
    }
}
