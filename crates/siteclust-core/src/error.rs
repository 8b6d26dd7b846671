//! Unified error types for the siteclust workspace
//!
//! Fatal conditions raised anywhere in the reduction pipeline are reported as a
//! [`ClusterError`]. Degraded-mode conditions are not errors; they are logged
//! and collected in [`crate::Diagnostics`] instead.
//!
//! # Example
//!
//! ```
//! use siteclust_core::{ClusterError, ClusterResult};
//!
//! fn check_weight(present: bool) -> ClusterResult<()> {
//!     if !present {
//!         return Err(ClusterError::Precondition("weight field 'capacity_mw' missing".into()));
//!     }
//!     Ok(())
//! }
//! assert!(check_weight(false).is_err());
//! ```

use thiserror::Error;

/// Error type for all siteclust operations.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Input data failed validation (missing or non-numeric feature, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid stage configuration (unknown method, missing cluster count, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A site could not be matched to a generation profile
    #[error("Profile error: {0}")]
    Profile(String),

    /// An operation's precondition on the data was not met
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A clustering method broke its labelling contract
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ClusterError.
pub type ClusterResult<T> = Result<T, ClusterError>;
