//! `freshness`: age of the newest value of a timestamp column.
//!
//! ```yaml
//! - type: freshness
//!   column: updated_at
//!   unit: hour
//!   must_be_less_than: 24
//! ```
//!
//! The age is measured against the run's reference time, which defaults to
//! the wall clock when the run starts.

use super::{
    AggregateFunction, AggregateMeasure, BuildContext, Check, CheckDefinition, CheckHeader,
    CheckNode, CheckType, threshold_summary,
};
use crate::contract::CHECK_TYPES_DOCS;
use crate::{CheckOutcome, CheckResult, Metric};
use chrono::{DateTime, Utc};
use contracts_core::{DiagnosticsLog, Threshold};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessUnit {
    Minute,
    Hour,
    Day,
}

impl FreshnessUnit {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().trim_end_matches('s') {
            "minute" => Some(FreshnessUnit::Minute),
            "hour" => Some(FreshnessUnit::Hour),
            "day" => Some(FreshnessUnit::Day),
            _ => None,
        }
    }

    fn seconds(&self) -> f64 {
        match self {
            FreshnessUnit::Minute => 60.0,
            FreshnessUnit::Hour => 3_600.0,
            FreshnessUnit::Day => 86_400.0,
        }
    }
}

impl fmt::Display for FreshnessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessUnit::Minute => write!(f, "minutes"),
            FreshnessUnit::Hour => write!(f, "hours"),
            FreshnessUnit::Day => write!(f, "days"),
        }
    }
}

pub struct FreshnessCheckType;

impl CheckType for FreshnessCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["freshness"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        node.require_column(log)?;
        let unit = match node.object.read_string_opt("unit", log) {
            None => FreshnessUnit::Hour,
            Some(unit) => match FreshnessUnit::parse(unit.as_str()) {
                Some(parsed) => parsed,
                None => {
                    log.error_with_docs(
                        format!(
                            "Invalid freshness unit '{}', use one of minute, hour, day",
                            unit.as_str()
                        ),
                        Some(&unit.location),
                        CHECK_TYPES_DOCS,
                    );
                    return None;
                }
            },
        };

        Some(Box::new(FreshnessDefinition {
            header: node.header.clone(),
            unit,
            threshold: node.threshold(None, log),
        }))
    }
}

#[derive(Debug)]
struct FreshnessDefinition {
    header: CheckHeader,
    unit: FreshnessUnit,
    threshold: Option<Threshold>,
}

impl CheckDefinition for FreshnessDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let max = ctx.aggregation(
            &self.header,
            Box::new(AggregateMeasure {
                function: AggregateFunction::Max,
            }),
        );
        Box::new(FreshnessCheck {
            summary: threshold_summary(
                self.threshold.as_ref(),
                &format!("freshness in {}", self.unit),
            ),
            header: self.header.clone(),
            unit: self.unit,
            threshold: self.threshold.clone(),
            max,
            now: ctx.now,
        })
    }
}

struct FreshnessCheck {
    header: CheckHeader,
    summary: String,
    unit: FreshnessUnit,
    threshold: Option<Threshold>,
    max: Arc<Metric>,
    now: DateTime<Utc>,
}

impl FreshnessCheck {
    fn result(&self, outcome: CheckOutcome, lines: Vec<String>) -> CheckResult {
        self.header.result(&self.summary, outcome, lines)
    }
}

impl Check for FreshnessCheck {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn evaluate(&self) -> CheckResult {
        let column = self.header.column_name().unwrap_or_default();
        if let Some(error) = self.max.error() {
            return self.result(
                CheckOutcome::Error,
                vec![format!("Could not compute max({}): {}", column, error)],
            );
        }

        let Some(value) = self.max.scalar().filter(|value| !value.is_null()) else {
            return self.result(
                CheckOutcome::NotEvaluated,
                vec![format!("Column '{}' has no values", column)],
            );
        };
        let mut lines = vec![format!("Actual max({}) was {}", column, value)];

        let Some(newest) = value.as_timestamp() else {
            lines.push(format!("'{}' is not a timestamp", value));
            return self.result(CheckOutcome::NotEvaluated, lines);
        };

        let age = (self.now - newest).num_milliseconds() as f64 / 1_000.0 / self.unit.seconds();
        lines.push(format!("Reference time was {}", self.now.to_rfc3339()));
        lines.push(format!("Actual freshness was {:.2} {}", age, self.unit));

        let outcome = match &self.threshold {
            Some(threshold) if threshold.passes(age) => CheckOutcome::Passed,
            Some(_) => CheckOutcome::Failed,
            None => CheckOutcome::NotEvaluated,
        };
        self.result(outcome, lines)
    }
}
