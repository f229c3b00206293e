//! Settings shared by every contract of one verification run.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Default number of check groups executed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Context for a verification run.
///
/// Carries the settings that are not part of any single contract: which data
/// source to fall back on, how many queries may run at once, values for
/// `${NAME}` substitution and the instant freshness checks are measured
/// against.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    /// Data source used by contracts that do not name one
    pub default_data_source: Option<String>,

    /// Upper bound on concurrently executing check groups
    pub max_concurrency: usize,

    /// Values for `${NAME}` placeholders in contract documents
    pub variables: HashMap<String, String>,

    /// Reference instant for freshness checks, `None` means "now"
    pub reference_time: Option<DateTime<Utc>>,

    /// Treat warnings as failures
    pub strict: bool,
}

impl Default for VerificationContext {
    fn default() -> Self {
        Self {
            default_data_source: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            variables: HashMap::new(),
            reference_time: None,
            strict: false,
        }
    }
}

impl VerificationContext {
    /// Creates a context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback data source name.
    pub fn with_default_data_source(mut self, name: impl Into<String>) -> Self {
        self.default_data_source = Some(name.into());
        self
    }

    /// Sets the concurrency bound. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Adds a substitution variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Adds several substitution variables; later entries win.
    pub fn with_variables<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Pins the reference instant for freshness checks.
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    /// Sets strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reference instant, falling back to the current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now)
    }
}
