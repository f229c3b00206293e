use super::{BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType};
use crate::{CheckOutcome, CheckResult, ColumnDefinition, Metric};
use contracts_core::DiagnosticsLog;
use std::collections::HashMap;
use std::sync::Arc;

/// `schema`: the declared columns exist with the declared types.
///
/// Column names compare case-insensitively. Columns the dataset has but the
/// contract does not declare fail the check unless `allow_extra_columns` is set.
pub struct SchemaCheckType;

impl CheckType for SchemaCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["schema"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        let allow_extra_columns = node
            .object
            .read_bool_opt("allow_extra_columns", log)
            .is_some_and(|allow| allow.value);
        Some(Box::new(SchemaDefinition {
            header: node.header.clone(),
            allow_extra_columns,
        }))
    }
}

#[derive(Debug)]
struct SchemaDefinition {
    header: CheckHeader,
    allow_extra_columns: bool,
}

impl CheckDefinition for SchemaDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let summary = if self.allow_extra_columns {
            "schema contains the declared columns"
        } else {
            "schema matches the declared columns"
        };
        Box::new(SchemaCheck {
            header: self.header.clone(),
            summary: summary.to_string(),
            expected: ctx.columns.to_vec(),
            allow_extra_columns: self.allow_extra_columns,
            metric: ctx.schema(),
        })
    }
}

struct SchemaCheck {
    header: CheckHeader,
    summary: String,
    expected: Vec<ColumnDefinition>,
    allow_extra_columns: bool,
    metric: Arc<Metric>,
}

impl Check for SchemaCheck {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn evaluate(&self) -> CheckResult {
        if let Some(error) = self.metric.error() {
            return self.header.result(
                &self.summary,
                CheckOutcome::Error,
                vec![format!("Could not read schema: {}", error)],
            );
        }
        let Some(actual) = self.metric.columns() else {
            return self.header.result(
                &self.summary,
                CheckOutcome::NotEvaluated,
                vec!["Schema was not read".to_string()],
            );
        };

        let described: Vec<String> = actual
            .iter()
            .map(|column| format!("{} {}", column.column_name, column.data_type))
            .collect();
        let mut lines = vec![format!("Actual schema was ({})", described.join(", "))];
        if actual.is_empty() {
            lines.push("Dataset has no columns, it may not exist".to_string());
            return self.header.result(&self.summary, CheckOutcome::Failed, lines);
        }

        let by_name: HashMap<String, &str> = actual
            .iter()
            .map(|column| (column.column_name.to_lowercase(), column.data_type.as_str()))
            .collect();

        let mut mismatches = Vec::new();
        for column in &self.expected {
            match by_name.get(&column.name.to_lowercase()) {
                None => mismatches.push(format!("Column '{}' is missing", column.name)),
                Some(actual_type) => {
                    if let Some(expected_type) = &column.data_type {
                        if !expected_type.eq_ignore_ascii_case(actual_type) {
                            mismatches.push(format!(
                                "Column '{}' has type '{}', expected '{}'",
                                column.name, actual_type, expected_type
                            ));
                        }
                    }
                }
            }
        }

        if !self.allow_extra_columns {
            for column in actual {
                let declared = self
                    .expected
                    .iter()
                    .any(|expected| expected.name.eq_ignore_ascii_case(&column.column_name));
                if !declared {
                    mismatches.push(format!("Column '{}' is not declared", column.column_name));
                }
            }
        }

        let outcome = if mismatches.is_empty() {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed
        };
        lines.extend(mismatches);
        self.header.result(&self.summary, outcome, lines)
    }
}
