use super::{
    BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType, ThresholdCheck,
    zero_if_null,
};
use crate::{AggregationMeasure, MissingConfiguration, ScalarValue};
use contracts_core::{DiagnosticsLog, Threshold};
use contracts_sql::{Literal, SqlExpr};
use std::sync::Arc;

/// Rows in which the column is NULL or matches the missing configuration.
#[derive(Debug)]
pub struct MissingCountMeasure {
    pub missing: MissingConfiguration,
}

impl AggregationMeasure for MissingCountMeasure {
    fn metric_type(&self) -> &'static str {
        "missing_count"
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.missing).unwrap_or_default()
    }

    fn sql_expression(&self, column: Option<&str>) -> SqlExpr {
        match column {
            Some(column) => SqlExpr::count_if(self.missing.is_missing_expr(column)),
            None => SqlExpr::Literal(Literal::Null),
        }
    }

    fn normalize(&self, raw: ScalarValue) -> ScalarValue {
        zero_if_null(raw)
    }
}

/// `missing_count` and `missing_percent`, by default required to be 0.
pub struct MissingCheckType;

impl CheckType for MissingCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["missing_count", "missing_percent"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        node.require_column(log)?;
        Some(Box::new(MissingDefinition {
            header: node.header.clone(),
            missing: node.missing(log),
            threshold: node.threshold(Some(Threshold::must_be(0.0)), log),
            percent: node.header.type_name == "missing_percent",
        }))
    }
}

#[derive(Debug)]
struct MissingDefinition {
    header: CheckHeader,
    missing: MissingConfiguration,
    threshold: Option<Threshold>,
    percent: bool,
}

impl CheckDefinition for MissingDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let count = ctx.aggregation(
            &self.header,
            Box::new(MissingCountMeasure {
                missing: self.missing.clone(),
            }),
        );
        if !self.percent {
            return Box::new(ThresholdCheck::new(
                self.header.clone(),
                "missing_count",
                self.threshold.clone(),
                Arc::clone(&count),
                vec![count],
            ));
        }

        let row_count = ctx.row_count(&self.header);
        let percent = ctx.percentage("missing_percent", &count, &row_count);
        Box::new(ThresholdCheck::new(
            self.header.clone(),
            "missing_percent",
            self.threshold.clone(),
            Arc::clone(&percent),
            vec![count, row_count, percent],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{build_checks, metric};
    use crate::{CheckOutcome, ScalarValue};
    use chrono::Utc;
    use contracts_sql::{AnsiDialect, SqlDialect};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_count_sql_includes_configured_values() {
        let yaml = "\
dataset: orders
columns:
  - name: customer_id
    missing_values: ['N/A', '']
    checks:
      - type: missing_count
";
        let (_, resolver, _) = build_checks(yaml, Utc::now());
        let metric_ref = metric(&resolver, "missing_count");
        let crate::MetricKind::Aggregation(aggregation) = metric_ref.kind()
        else {
            panic!("missing_count is an aggregation");
        };
        assert_eq!(
            AnsiDialect.render_expression(&aggregation.sql_expression()),
            "SUM(CASE WHEN \"customer_id\" IS NULL OR \"customer_id\" IN ('N/A', '') THEN 1 ELSE 0 END)"
        );
    }

    #[test]
    fn test_missing_count_against_threshold() {
        let yaml = "\
dataset: orders
checks:
  - type: missing_count
    column: customer_id
    must_be: 0
  - type: missing_count
    column: customer_id
    must_be_less_than_or_equal: 5
";
        let (checks, resolver, _) = build_checks(yaml, Utc::now());
        assert_eq!(resolver.len(), 1);

        metric(&resolver, "missing_count").set_value(ScalarValue::Integer(3));
        let strict = checks[0].evaluate();
        assert_eq!(strict.outcome, CheckOutcome::Failed);
        assert_eq!(strict.diagnostic_lines, vec!["Actual missing_count was 3"]);
        assert_eq!(checks[1].evaluate().outcome, CheckOutcome::Passed);
    }

    #[test]
    fn test_missing_percent_of_empty_dataset_is_not_evaluated() {
        let yaml = "\
dataset: orders
checks:
  - type: missing_percent
    column: customer_id
    must_be_less_than: 5
";
        let (checks, resolver, _) = build_checks(yaml, Utc::now());
        metric(&resolver, "missing_count").set_value(ScalarValue::Null);
        metric(&resolver, "row_count").set_value(ScalarValue::Integer(0));
        metric(&resolver, "missing_percent").compute();

        let result = checks[0].evaluate();
        assert_eq!(result.outcome, CheckOutcome::NotEvaluated);
        assert_eq!(
            result.diagnostic_lines,
            vec![
                "Actual missing_count was 0",
                "Actual row_count was 0",
                "missing_percent is not evaluated because row_count was 0",
            ]
        );
    }

    #[test]
    fn test_missing_percent() {
        let yaml = "\
dataset: orders
checks:
  - type: missing_percent
    column: customer_id
    must_be_less_than: 5
";
        let (checks, resolver, _) = build_checks(yaml, Utc::now());
        metric(&resolver, "missing_count").set_value(ScalarValue::Integer(3));
        metric(&resolver, "row_count").set_value(ScalarValue::Integer(100));
        metric(&resolver, "missing_percent").compute();

        let result = checks[0].evaluate();
        assert_eq!(result.outcome, CheckOutcome::Passed);
        assert_eq!(result.diagnostic_lines[2], "Actual missing_percent was 3");
    }

    #[test]
    fn test_check_level_settings_override_column_level() {
        let yaml = "\
dataset: orders
columns:
  - name: code
    missing_values: ['N/A']
checks:
  - type: missing_count
    column: code
    missing_values: ['-']
";
        let (_, resolver, _) = build_checks(yaml, Utc::now());
        let metric_ref = metric(&resolver, "missing_count");
        let crate::MetricKind::Aggregation(aggregation) = metric_ref.kind()
        else {
            panic!("missing_count is an aggregation");
        };
        let sql = AnsiDialect.render_expression(&aggregation.sql_expression());
        assert!(sql.contains("IN ('-')"), "{}", sql);
    }

    #[test]
    fn test_empty_check_level_list_clears_column_values() {
        let yaml = "\
dataset: orders
columns:
  - name: code
    missing_values: ['N/A']
checks:
  - type: missing_count
    column: code
    missing_values: []
";
        let (_, resolver, log) = build_checks(yaml, Utc::now());
        assert!(!log.has_errors());
        let metric_ref = metric(&resolver, "missing_count");
        let crate::MetricKind::Aggregation(aggregation) = metric_ref.kind()
        else {
            panic!("missing_count is an aggregation");
        };
        assert_eq!(
            AnsiDialect.render_expression(&aggregation.sql_expression()),
            "SUM(CASE WHEN \"code\" IS NULL THEN 1 ELSE 0 END)"
        );
    }

    #[test]
    fn test_column_is_required() {
        let yaml = "dataset: orders\nchecks:\n  - type: missing_count\n";
        let (checks, _, log) = build_checks(yaml, Utc::now());
        assert!(checks.is_empty());
        assert_eq!(
            log.snapshot()[0].message,
            "Check type 'missing_count' requires a 'column'"
        );
    }
}
