//! # siteclust-core: Site Tables and Settings
//!
//! Shared data structures for reducing a population of candidate renewable
//! project sites to a handful of representative clusters.
//!
//! ## Core Data Structures
//!
//! - [`SiteRecord`] - one candidate project area (capacity, cost, features, profile)
//! - [`SiteTable`] - the table every pipeline stage consumes and produces
//! - [`KeyValue`] - a totally ordered grouping-key cell
//! - [`ClusterSummary`] - one aggregated cluster
//!
//! ## Modules
//!
//! - [`config`] - typed per-stage settings (`FilterSpec`, `BinSpec`, `ClusterStageSpec`, ...)
//! - [`diagnostics`] - degraded-mode warnings collected during a run
//! - [`error`] - the [`ClusterError`] taxonomy
//!
//! The algorithms live in `siteclust-algo`; file formats live in `siteclust-io`.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod site;

pub use config::{
    load_settings_from_path, resolve_groups, AggregateSpec, BinEdges, BinSpec, ClusterSettings,
    ClusterStageSpec, FilterSpec, Linkage, Quantiles, SettingsFile,
};
pub use diagnostics::{DiagnosticIssue, Diagnostics};
pub use error::{ClusterError, ClusterResult};
pub use site::{
    canonical_name, ClusterSummary, FeatureKind, KeyValue, SiteRecord, SiteTable, CAPACITY_COL,
    COST_COL, PROFILE_COL,
};
