//! Run-scoped diagnostics log.
//!
//! Parsing, contract construction and verification never abort on the first
//! problem. Instead every issue is appended to a [`DiagnosticsLog`] as a
//! located [`Diagnostic`] so a single run surfaces all of them. A run is
//! considered failed if the log holds any error record at the end, whatever
//! the individual check outcomes were.

use crate::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Should be reviewed, does not fail the run unless strict
    Warning,

    /// Fails the run
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single located diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Where in the contract document the issue was found
    pub location: Option<SourceLocation>,

    /// Reference into the contract format documentation
    pub docs_ref: Option<String>,
}

impl Diagnostic {
    /// Creates a diagnostic without location.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
            docs_ref: None,
        }
    }

    /// Creates an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Sets the location.
    pub fn with_location(mut self, location: Option<&SourceLocation>) -> Self {
        self.location = location.cloned();
        self
    }

    /// Sets the documentation reference.
    pub fn with_docs_ref(mut self, docs_ref: impl Into<String>) -> Self {
        self.docs_ref = Some(docs_ref.into());
        self
    }

    /// Returns true for error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(docs_ref) = &self.docs_ref {
            write!(f, " (docs: {})", docs_ref)?;
        }
        Ok(())
    }
}

/// Append-only, shareable accumulator of diagnostics for one run.
///
/// Cloning a log yields another handle to the same records, so parser,
/// contract builder and orchestrator tasks can all append concurrently.
///
/// # Example
///
/// ```rust
/// use contracts_core::{DiagnosticsLog, SourceLocation};
///
/// let log = DiagnosticsLog::new();
/// let location = SourceLocation::new("orders.yml", 1, 1);
/// log.error("'dataset' is required", Some(&location));
/// assert!(log.has_errors());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsLog {
    records: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticsLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        // Records are only ever appended, a poisoned lock still holds a valid list.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a diagnostic and emits it as a structured log event.
    pub fn push(&self, diagnostic: Diagnostic) {
        let location = diagnostic.location.as_ref().map(ToString::to_string);
        match diagnostic.severity {
            Severity::Error => error!(
                location = ?location,
                docs_ref = ?diagnostic.docs_ref,
                "{}",
                diagnostic.message
            ),
            Severity::Warning => warn!(
                location = ?location,
                docs_ref = ?diagnostic.docs_ref,
                "{}",
                diagnostic.message
            ),
            Severity::Info => info!(location = ?location, "{}", diagnostic.message),
        }
        self.records().push(diagnostic);
    }

    /// Records an error.
    pub fn error(&self, message: impl Into<String>, location: Option<&SourceLocation>) {
        self.push(Diagnostic::error(message).with_location(location));
    }

    /// Records an error with a documentation reference.
    pub fn error_with_docs(
        &self,
        message: impl Into<String>,
        location: Option<&SourceLocation>,
        docs_ref: impl Into<String>,
    ) {
        self.push(
            Diagnostic::error(message)
                .with_location(location)
                .with_docs_ref(docs_ref),
        );
    }

    /// Records a warning.
    pub fn warning(&self, message: impl Into<String>, location: Option<&SourceLocation>) {
        self.push(Diagnostic::warning(message).with_location(location));
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>, location: Option<&SourceLocation>) {
        self.push(Diagnostic::new(Severity::Info, message).with_location(location));
    }

    /// Returns true if any error has been recorded.
    pub fn has_errors(&self) -> bool {
        self.records().iter().any(Diagnostic::is_error)
    }

    /// Returns true if any warning has been recorded.
    pub fn has_warnings(&self) -> bool {
        self.count(Severity::Warning) > 0
    }

    /// Number of records with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.records()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Copy of all records in order of discovery.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.records().clone()
    }

    /// Copy of all records sorted by location.
    ///
    /// Records without a location come first; the sort is stable so records at
    /// the same position keep their discovery order.
    pub fn sorted(&self) -> Vec<Diagnostic> {
        let mut records = self.snapshot();
        records.sort_by(|a, b| a.location.cmp(&b.location));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    #[test]
    fn test_display_with_location_and_docs() {
        let diagnostic = Diagnostic::error("Invalid email")
            .with_location(Some(&SourceLocation::new("orders.yml", 3, 14)))
            .with_docs_ref("contract-format.md#string-types");

        assert_eq!(
            diagnostic.to_string(),
            "orders.yml:3:14: error: Invalid email (docs: contract-format.md#string-types)"
        );
    }

    #[test]
    fn test_has_errors_only_counts_errors() {
        let log = DiagnosticsLog::new();
        log.warning("column is not declared", None);
        log.info("parsed", None);
        assert!(!log.has_errors());
        assert!(log.has_warnings());

        log.error("'dataset' is required", Some(&SourceLocation::start_of("a.yml")));
        assert!(log.has_errors());
        assert_eq!(log.count(Severity::Error), 1);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_clones_share_records() {
        let log = DiagnosticsLog::new();
        let handle = log.clone();
        handle.error("boom", None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_concurrent_append_loses_nothing() {
        let log = DiagnosticsLog::new();
        thread::scope(|scope| {
            for worker in 0..8 {
                let log = log.clone();
                scope.spawn(move || {
                    for i in 0..50 {
                        log.warning(format!("worker {} record {}", worker, i), None);
                    }
                });
            }
        });
        assert_eq!(log.len(), 400);
    }

    #[test]
    fn test_sorted_by_location() {
        let log = DiagnosticsLog::new();
        log.error("third", Some(&SourceLocation::new("a.yml", 9, 1)));
        log.error("first", None);
        log.error("second", Some(&SourceLocation::new("a.yml", 2, 3)));

        let messages: Vec<String> = log.sorted().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }
}
