//! Diagnostics collected while reducing a site table.
//!
//! Degraded-mode conditions (a bin spec with no method, an out-of-range cluster
//! count, a missing cost column) do not abort the pipeline. Each one is logged
//! through `tracing` as a warning and recorded here so callers can report them
//! after the run, or serialise them next to the output.
//!
//! # Example
//!
//! ```
//! use siteclust_core::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning_with_entity("binning", "no 'bins' or 'q' given; using a single bin", "lcoe");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.issues[0].entity.as_deref(), Some("lcoe"));
//! ```

use serde::Serialize;

/// A single warning raised during a run
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    /// Pipeline step that raised the issue (e.g. "binning", "clustering")
    pub category: String,
    pub message: String,
    /// Feature, stage or group the issue refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Warnings collected over one pipeline invocation, in the order raised
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning about `entity` and forward it to `tracing`.
    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        let issue = DiagnosticIssue {
            category: category.to_string(),
            message: message.to_string(),
            entity: Some(entity.to_string()),
        };
        tracing::warn!("{}", issue);
        self.issues.push(issue);
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len()
    }

    pub fn has_warnings(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_counted_by_category() {
        let mut diag = Diagnostics::new();
        assert!(!diag.has_warnings());
        diag.add_warning_with_entity("selection", "no cost column", "east");
        diag.add_warning_with_entity("binning", "single bin", "lcoe");
        diag.add_warning_with_entity("binning", "rows dropped", "lcoe");

        assert_eq!(diag.warning_count(), 3);
        assert!(diag.has_warnings());
        assert_eq!(diag.issues_by_category("binning").count(), 2);
        assert_eq!(diag.issues[0].category, "selection");
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_warning_with_entity("clustering", "n_clusters clipped", "profile");

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"entity\": \"profile\""));
        assert!(json.contains("\"category\": \"clustering\""));
        assert_eq!(serde_json::to_string(&Diagnostics::new()).unwrap(), "{}");
    }

    #[test]
    fn test_issue_display() {
        let mut diag = Diagnostics::new();
        diag.add_warning_with_entity("binning", "single bin fallback", "lcoe");
        assert_eq!(diag.issues[0].to_string(), "[binning] single bin fallback (lcoe)");
    }
}
