//! Clustering methods and the registry that selects them by name.
//!
//! A cluster stage names its method (`method: agglomerative`); the driver looks
//! the name up in a [`ClusterMethodRegistry`] and hands the method the stage's
//! items. New methods are added by registering another [`ClusterMethod`], with
//! no change to the driver.
//!
//! The agglomerative method has two variants sharing one edge-case policy:
//! [`cluster_profiles`] clusters full time-series vectors and
//! [`cluster_scalars`] clusters a single numeric feature.

use std::collections::HashMap;
use std::sync::Arc;

use siteclust_core::{ClusterResult, ClusterStageSpec, Linkage};
use tracing::warn;

use crate::hierarchical::agglomerative;

/// Why a requested cluster count was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountCoercion {
    /// `n_clusters <= 0`, raised to 1
    NonPositive,
    /// `n_clusters` larger than the item count, lowered to it
    ExceedsItems,
}

impl CountCoercion {
    pub fn message(&self, requested: i64, n_items: usize) -> String {
        match self {
            CountCoercion::NonPositive => format!(
                "n_clusters must be >= 1 but was {}; using 1 cluster",
                requested
            ),
            CountCoercion::ExceedsItems => format!(
                "n_clusters {} exceeds the {} sites in the group; every site becomes its own cluster",
                requested, n_items
            ),
        }
    }
}

/// Clamp a requested cluster count to `[1, n_items]`.
pub fn coerce_cluster_count(requested: i64, n_items: usize) -> (usize, Option<CountCoercion>) {
    if requested <= 0 {
        return (1, Some(CountCoercion::NonPositive));
    }
    let requested_items = usize::try_from(requested).unwrap_or(usize::MAX);
    if requested_items > n_items {
        return (n_items, Some(CountCoercion::ExceedsItems));
    }
    (requested_items, None)
}

fn cluster_points(points: &[&[f64]], n_clusters: i64, linkage: Linkage) -> ClusterResult<Vec<u32>> {
    match points.len() {
        0 => return Ok(Vec::new()),
        1 => return Ok(vec![1]),
        _ => {}
    }
    let (k, coercion) = coerce_cluster_count(n_clusters, points.len());
    if let Some(coercion) = coercion {
        warn!("{}", coercion.message(n_clusters, points.len()));
    }
    agglomerative(points, k, linkage)
}

/// Cluster equal-length time-series profiles into `min(k, n)` groups.
pub fn cluster_profiles(
    profiles: &[&[f64]],
    n_clusters: i64,
    linkage: Linkage,
) -> ClusterResult<Vec<u32>> {
    cluster_points(profiles, n_clusters, linkage)
}

/// Cluster single feature values into `min(k, n)` groups.
pub fn cluster_scalars(values: &[f64], n_clusters: i64, linkage: Linkage) -> ClusterResult<Vec<u32>> {
    let points: Vec<&[f64]> = values.iter().map(std::slice::from_ref).collect();
    cluster_points(&points, n_clusters, linkage)
}

/// The items of one clustering call.
#[derive(Debug, Clone)]
pub enum FeatureData<'a> {
    /// Full generation profiles, one per site
    Profiles(Vec<&'a [f64]>),
    /// One scalar feature value per site
    Scalars(Vec<f64>),
}

impl FeatureData<'_> {
    pub fn len(&self) -> usize {
        match self {
            FeatureData::Profiles(p) => p.len(),
            FeatureData::Scalars(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A way of partitioning items into groups.
pub trait ClusterMethod: Send + Sync {
    /// Registry key (e.g., "agglomerative")
    fn id(&self) -> &str;

    /// Return one 1-based label per item using exactly `min(n_clusters, n)`
    /// labels. Stage options (linkage, ...) are read from `stage`.
    fn partition(
        &self,
        data: &FeatureData<'_>,
        n_clusters: i64,
        stage: &ClusterStageSpec,
    ) -> ClusterResult<Vec<u32>>;
}

/// Hierarchical (agglomerative) clustering.
#[derive(Debug, Default, Clone, Copy)]
pub struct Agglomerative;

impl ClusterMethod for Agglomerative {
    fn id(&self) -> &str {
        "agglomerative"
    }

    fn partition(
        &self,
        data: &FeatureData<'_>,
        n_clusters: i64,
        stage: &ClusterStageSpec,
    ) -> ClusterResult<Vec<u32>> {
        match data {
            FeatureData::Profiles(profiles) => cluster_profiles(profiles, n_clusters, stage.linkage),
            FeatureData::Scalars(values) => cluster_scalars(values, n_clusters, stage.linkage),
        }
    }
}

/// Holds the registered clustering methods.
///
/// Create with `ClusterMethodRegistry::new()` for empty or
/// `ClusterMethodRegistry::with_defaults()` for the built-in methods.
#[derive(Default, Clone)]
pub struct ClusterMethodRegistry {
    methods: HashMap<String, Arc<dyn ClusterMethod>>,
}

impl ClusterMethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `agglomerative` registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Agglomerative));
        registry
    }

    /// Register a method, replacing any method with the same id.
    pub fn register(&mut self, method: Arc<dyn ClusterMethod>) {
        self.methods.insert(method.id().to_string(), method);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ClusterMethod>> {
        self.methods.get(id).cloned()
    }

    /// Registered method ids, sorted.
    pub fn list_methods(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.methods.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ClusterMethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterMethodRegistry")
            .field("methods", &self.list_methods())
            .finish()
    }
}
