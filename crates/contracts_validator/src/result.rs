//! Verification results and the run report.

use contracts_core::{Diagnostic, Severity, SourceLocation};
use serde::Serialize;
use std::fmt;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// No threshold or no comparable value
    NotEvaluated,
    /// A metric the check depends on could not be computed
    Error,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Passed => write!(f, "PASSED"),
            CheckOutcome::Failed => write!(f, "FAILED"),
            CheckOutcome::NotEvaluated => write!(f, "NOT_EVALUATED"),
            CheckOutcome::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of evaluating one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub check_type: String,
    pub name: Option<String>,
    pub column: Option<String>,
    /// Assertion summary, e.g. `missing_count must be 0`
    pub summary: String,
    pub outcome: CheckOutcome,
    /// Every metric value read, e.g. `Actual missing_count was 3`
    pub diagnostic_lines: Vec<String>,
    pub location: SourceLocation,
}

/// Results of one contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractResult {
    /// File id the contract was read from
    pub source: String,
    pub dataset: String,
    pub data_source: String,
    pub check_results: Vec<CheckResult>,
}

impl ContractResult {
    pub fn count(&self, outcome: CheckOutcome) -> usize {
        self.check_results
            .iter()
            .filter(|result| result.outcome == outcome)
            .count()
    }
}

/// Everything a verification run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub contract_results: Vec<ContractResult>,
    /// All diagnostics of the run, sorted by location
    pub diagnostics: Vec<Diagnostic>,
    /// SQL statements in execution order
    pub executed_sql: Vec<String>,
    /// Warnings fail the run
    pub strict: bool,
}

impl VerificationReport {
    /// True when no check failed or errored and no blocking diagnostic exists.
    pub fn is_ok(&self) -> bool {
        let checks_ok = self.contract_results.iter().all(|contract| {
            contract.count(CheckOutcome::Failed) == 0 && contract.count(CheckOutcome::Error) == 0
        });
        checks_ok && !self.has_errors() && !(self.strict && self.has_warnings())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Warning)
    }

    /// Number of check results with `outcome` across all contracts.
    pub fn count(&self, outcome: CheckOutcome) -> usize {
        self.contract_results
            .iter()
            .map(|contract| contract.count(outcome))
            .sum()
    }

    pub fn check_results(&self) -> impl Iterator<Item = &CheckResult> {
        self.contract_results
            .iter()
            .flat_map(|contract| contract.check_results.iter())
    }
}
