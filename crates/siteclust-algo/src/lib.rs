//! # siteclust-algo: Site Reduction Pipeline
//!
//! Reduces a population of candidate renewable sites to a few representative
//! clusters with aggregated capacity, capacity-weighted cost and a
//! capacity-weighted generation profile.
//!
//! ## Pipeline
//!
//! [`assign_site_clusters`] runs one settings group through these stages:
//!
//! | Stage | Function | Effect |
//! |-------|----------|--------|
//! | Filter | [`value_filter`] | drop sites outside an inclusive range |
//! | Selection | [`select_min_capacity`] | keep the cheapest sites up to a capacity target |
//! | Profiles | [`attach_profiles`] | join and time-shift generation profiles |
//! | Binning | [`value_bin`] | split sites into quantile or fixed-width bins |
//! | Clustering | [`run_cluster_stages`] | nested hierarchical clustering with unique labels |
//! | Aggregation | [`aggregate_clusters`] | one weighted summary row per cluster |
//!
//! Several groups over the same sites run in parallel with
//! [`assign_clusters_for_groups`].
//!
//! ## Clustering Methods
//!
//! Cluster stages look their method up by name in a [`ClusterMethodRegistry`].
//! The built-in `agglomerative` method ([`hierarchical`]) supports Ward,
//! average, complete and single linkage.
//!
//! ## Example
//!
//! ```ignore
//! use siteclust_algo::{assign_site_clusters, ClusterMethodRegistry, ProfileJoin};
//! use siteclust_core::ClusterSettings;
//!
//! let join = ProfileJoin::new(&profiles);
//! let run = assign_site_clusters(&sites, &settings, Some(&join), &ClusterMethodRegistry::with_defaults())?;
//! for summary in run.summaries.unwrap_or_default() {
//!     println!("cluster {}: {} MW", summary.cluster, summary.sums["capacity_mw"]);
//! }
//! ```

pub mod aggregate;
pub mod binning;
pub mod clusterer;
pub mod driver;
pub mod filter;
pub mod hierarchical;
pub mod pipeline;
pub mod profiles;
pub mod selection;
pub mod summary;

pub use aggregate::aggregate_clusters;
pub use binning::{apply_bin, validate_bin_specs, value_bin};
pub use clusterer::{
    cluster_profiles, cluster_scalars, coerce_cluster_count, Agglomerative, ClusterMethod,
    ClusterMethodRegistry, CountCoercion, FeatureData,
};
pub use driver::{resolve_cluster_count, run_cluster_stages, ClusterAccumulator};
pub use filter::value_filter;
pub use hierarchical::agglomerative;
pub use pipeline::{assign_clusters_for_groups, assign_site_clusters, ClusterRun};
pub use profiles::{attach_profiles, shift_profile, ProfileJoin, ProfileSource, ProfileTable};
pub use selection::select_min_capacity;
pub use summary::{capacity_by_cost_bin, CostBinCapacity, CostBinSummary, DEFAULT_COST_BIN_EDGES};
