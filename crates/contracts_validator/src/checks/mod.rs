//! Check-type framework.
//!
//! A check goes through three forms:
//!
//! 1. [`CheckType`] parses a check node into a [`CheckDefinition`]. Types are
//!    looked up by the node's `type` field in a [`CheckTypeRegistry`].
//! 2. [`CheckDefinition::build`] requests the metrics it needs from the
//!    resolver and returns a [`Check`] bound to their canonical instances.
//! 3. After the orchestrator has filled every metric, [`Check::evaluate`]
//!    turns the values into a [`CheckResult`].

mod aggregate;
mod duplicate;
mod freshness;
mod invalid;
mod missing;
mod row_count;
mod schema;

pub use aggregate::{AggregateCheckType, AggregateFunction, AggregateMeasure};
pub use duplicate::{DuplicateCheckType, DuplicateCountMeasure};
pub use freshness::{FreshnessCheckType, FreshnessUnit};
pub use invalid::{InvalidCheckType, InvalidCountMeasure};
pub use missing::{MissingCheckType, MissingCountMeasure};
pub use row_count::{RowCountCheckType, RowCountMeasure};
pub use schema::SchemaCheckType;

use crate::{
    AggregationMeasure, CheckOutcome, CheckResult, ColumnDefinition, Metric, MetricKind,
    MetricResolver, MissingConfiguration, ScalarValue, ValidityConfiguration,
};
use chrono::{DateTime, Utc};
use contracts_core::{DiagnosticsLog, SourceLocation, Threshold, YamlObject};
use contracts_sql::TableRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Parses check nodes of one or more `type` names.
pub trait CheckType: Send + Sync {
    /// Type names handled, e.g. `["missing_count", "missing_percent"]`.
    fn names(&self) -> &'static [&'static str];

    /// Builds a definition, or logs why none can be built and returns `None`.
    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>>;
}

/// A check node handed to a [`CheckType`].
pub struct CheckNode<'a> {
    pub header: CheckHeader,
    pub object: &'a YamlObject,
}

impl CheckNode<'_> {
    /// Threshold keys of the node, `default` when there are none.
    pub fn threshold(&self, default: Option<Threshold>, log: &DiagnosticsLog) -> Option<Threshold> {
        Threshold::create(self.object, default, log)
    }

    /// Column-level missing settings overridden by check-level ones.
    pub fn missing(&self, log: &DiagnosticsLog) -> MissingConfiguration {
        let own = MissingConfiguration::parse(self.object, log);
        match &self.header.column {
            Some(column) => column.missing.merged(&own),
            None => own,
        }
    }

    /// Column-level validity settings overridden by check-level ones.
    pub fn validity(&self, log: &DiagnosticsLog) -> ValidityConfiguration {
        let own = ValidityConfiguration::parse(self.object, log);
        match &self.header.column {
            Some(column) => column.validity.merged(&own),
            None => own,
        }
    }

    /// The bound column, logging an error when there is none.
    pub fn require_column(&self, log: &DiagnosticsLog) -> Option<&ColumnDefinition> {
        let column = self.header.column.as_ref();
        if column.is_none() {
            log.error_with_docs(
                format!("Check type '{}' requires a 'column'", self.header.type_name),
                Some(&self.header.location),
                crate::contract::CHECK_TYPES_DOCS,
            );
        }
        column
    }
}

/// Properties every check has, whatever its type.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckHeader {
    pub type_name: String,
    pub name: Option<String>,
    pub column: Option<ColumnDefinition>,
    /// SQL predicate restricting the rows the check looks at
    pub filter: Option<String>,
    pub location: SourceLocation,
}

impl CheckHeader {
    pub fn parse(
        type_name: &str,
        node: &YamlObject,
        column: Option<ColumnDefinition>,
        log: &DiagnosticsLog,
    ) -> Self {
        let name = node.read_string_opt("name", log).map(|name| {
            name.validate_name(log);
            name.value.clone()
        });
        let filter = node
            .read_string_opt("filter", log)
            .map(|filter| filter.value.trim().to_string())
            .filter(|filter| !filter.is_empty());

        Self {
            type_name: type_name.to_string(),
            name,
            column,
            filter,
            location: node.location().clone(),
        }
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column.as_ref().map(|column| column.name.as_str())
    }

    /// Result of this check with the given outcome.
    pub fn result(&self, summary: &str, outcome: CheckOutcome, lines: Vec<String>) -> CheckResult {
        CheckResult {
            check_type: self.type_name.clone(),
            name: self.name.clone(),
            column: self.column_name().map(str::to_string),
            summary: summary.to_string(),
            outcome,
            diagnostic_lines: lines,
            location: self.location.clone(),
        }
    }
}

/// A parsed check, not yet bound to metrics.
pub trait CheckDefinition: fmt::Debug + Send + Sync {
    fn header(&self) -> &CheckHeader;

    /// Requests metrics from the resolver and returns the bound check.
    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check>;
}

/// What a definition needs to request its metrics.
pub struct BuildContext<'a> {
    pub data_source: &'a str,
    pub dataset: &'a TableRef,
    pub columns: &'a [ColumnDefinition],
    /// Reference instant for time-based checks
    pub now: DateTime<Utc>,
    pub resolver: &'a mut MetricResolver,
}

impl BuildContext<'_> {
    /// Canonical aggregation metric for `measure` on the check's column and filter.
    pub fn aggregation(
        &mut self,
        header: &CheckHeader,
        measure: Box<dyn AggregationMeasure>,
    ) -> Arc<Metric> {
        self.resolver.resolve(Metric::aggregation(
            self.data_source,
            self.dataset.clone(),
            header.column_name().map(str::to_string),
            header.filter.clone(),
            measure,
        ))
    }

    /// Row count under the check's filter.
    pub fn row_count(&mut self, header: &CheckHeader) -> Arc<Metric> {
        self.resolver.resolve(Metric::aggregation(
            self.data_source,
            self.dataset.clone(),
            None,
            header.filter.clone(),
            Box::new(RowCountMeasure),
        ))
    }

    pub fn percentage(
        &mut self,
        name: &str,
        fraction: &Arc<Metric>,
        total: &Arc<Metric>,
    ) -> Arc<Metric> {
        self.resolver.resolve(Metric::percentage(
            name,
            Arc::clone(fraction),
            Arc::clone(total),
        ))
    }

    pub fn schema(&mut self) -> Arc<Metric> {
        self.resolver
            .resolve(Metric::schema(self.data_source, self.dataset.clone()))
    }
}

/// A check bound to its metrics.
pub trait Check: Send + Sync {
    fn header(&self) -> &CheckHeader;

    /// Assertion summary, e.g. `missing_count must be 0`.
    fn summary(&self) -> &str;

    /// Evaluates the check. Every metric it reads must already have a value.
    fn evaluate(&self) -> CheckResult;
}

/// Summary of a threshold on `metric`, or a marker when the threshold is invalid.
pub fn threshold_summary(threshold: Option<&Threshold>, metric: &str) -> String {
    match threshold {
        Some(threshold) => threshold.assertion_summary(metric),
        None => format!("{} (invalid threshold)", metric),
    }
}

/// `NULL` aggregates over zero matching rows become `0`.
pub(crate) fn zero_if_null(raw: ScalarValue) -> ScalarValue {
    if raw.is_null() {
        ScalarValue::Integer(0)
    } else {
        raw
    }
}

/// Compares one metric against a threshold and reports the metrics it read.
pub struct ThresholdCheck {
    header: CheckHeader,
    summary: String,
    threshold: Option<Threshold>,
    metric: Arc<Metric>,
    reported: Vec<Arc<Metric>>,
}

impl ThresholdCheck {
    /// `reported` lists every metric read, in the order its line is printed.
    pub fn new(
        header: CheckHeader,
        label: &str,
        threshold: Option<Threshold>,
        metric: Arc<Metric>,
        reported: Vec<Arc<Metric>>,
    ) -> Self {
        Self {
            summary: threshold_summary(threshold.as_ref(), label),
            header,
            threshold,
            metric,
            reported,
        }
    }

    fn missing_value_reason(&self) -> String {
        if let MetricKind::Derived(derived) = self.metric.kind() {
            if let Some(total) = derived.inputs.get(1) {
                if total.number() == Some(0.0) {
                    return format!(
                        "{} is not evaluated because {} was 0",
                        self.metric.name(),
                        total.name()
                    );
                }
            }
        }
        format!("{} has no numeric value", self.metric.name())
    }
}

impl Check for ThresholdCheck {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn evaluate(&self) -> CheckResult {
        let mut lines = Vec::new();
        let mut failed = false;
        for metric in &self.reported {
            if let Some(error) = metric.error() {
                lines.push(format!("Could not compute {}: {}", metric.name(), error));
                failed = true;
            } else if let Some(value) = metric.scalar().filter(|value| !value.is_null()) {
                lines.push(format!("Actual {} was {}", metric.name(), value));
            }
        }
        if failed {
            return self.header.result(&self.summary, CheckOutcome::Error, lines);
        }

        let outcome = match (self.metric.number(), &self.threshold) {
            (Some(value), Some(threshold)) => {
                if threshold.passes(value) {
                    CheckOutcome::Passed
                } else {
                    CheckOutcome::Failed
                }
            }
            (None, _) => {
                lines.push(self.missing_value_reason());
                CheckOutcome::NotEvaluated
            }
            (Some(_), None) => {
                lines.push(format!(
                    "{} is not evaluated because its threshold is invalid",
                    self.metric.name()
                ));
                CheckOutcome::NotEvaluated
            }
        };
        self.header.result(&self.summary, outcome, lines)
    }
}

/// A check whose configuration rules out evaluation.
pub struct UnevaluableCheck {
    header: CheckHeader,
    summary: String,
    reason: String,
}

impl UnevaluableCheck {
    pub fn new(header: CheckHeader, summary: String, reason: String) -> Self {
        Self {
            header,
            summary,
            reason,
        }
    }
}

impl Check for UnevaluableCheck {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn evaluate(&self) -> CheckResult {
        self.header.result(
            &self.summary,
            CheckOutcome::NotEvaluated,
            vec![self.reason.clone()],
        )
    }
}

/// Maps `type` names to check types.
#[derive(Clone)]
pub struct CheckTypeRegistry {
    types: HashMap<&'static str, Arc<dyn CheckType>>,
}

impl CheckTypeRegistry {
    /// Registry without any check type.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry with every built-in check type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RowCountCheckType));
        registry.register(Arc::new(MissingCheckType));
        registry.register(Arc::new(InvalidCheckType));
        registry.register(Arc::new(DuplicateCheckType));
        registry.register(Arc::new(AggregateCheckType));
        registry.register(Arc::new(FreshnessCheckType));
        registry.register(Arc::new(SchemaCheckType));
        registry
    }

    /// Registers `check_type` under each of its names, replacing earlier ones.
    pub fn register(&mut self, check_type: Arc<dyn CheckType>) {
        for name in check_type.names() {
            if self.types.insert(name, Arc::clone(&check_type)).is_some() {
                debug!(check_type = name, "Replaced registered check type");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn CheckType> {
        self.types.get(name).map(|check_type| check_type.as_ref())
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CheckTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CheckTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckTypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}
