use super::{
    BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType, ThresholdCheck,
    UnevaluableCheck, zero_if_null,
};
use crate::contract::COLUMNS_DOCS;
use crate::{AggregationMeasure, MissingConfiguration, ScalarValue, ValidityConfiguration};
use contracts_core::{DiagnosticsLog, Threshold};
use contracts_sql::{Literal, SqlExpr};
use serde_json::json;
use std::sync::Arc;

/// Rows in which the column is present but not valid.
#[derive(Debug)]
pub struct InvalidCountMeasure {
    pub missing: MissingConfiguration,
    pub validity: ValidityConfiguration,
}

impl AggregationMeasure for InvalidCountMeasure {
    fn metric_type(&self) -> &'static str {
        "invalid_count"
    }

    fn config(&self) -> serde_json::Value {
        json!({ "missing": self.missing, "validity": self.validity })
    }

    fn sql_expression(&self, column: Option<&str>) -> SqlExpr {
        let (Some(column), Some(valid)) =
            (column, column.and_then(|c| self.validity.is_valid_expr(c)))
        else {
            return SqlExpr::Literal(Literal::Null);
        };
        SqlExpr::count_if(SqlExpr::and(vec![
            SqlExpr::not(self.missing.is_missing_expr(column)),
            SqlExpr::not(valid),
        ]))
    }

    fn normalize(&self, raw: ScalarValue) -> ScalarValue {
        zero_if_null(raw)
    }
}

/// `invalid_count` and `invalid_percent`, by default required to be 0.
///
/// Needs at least one of `valid_values`, `valid_regex`, `valid_min` or
/// `valid_max` on the check or its column.
pub struct InvalidCheckType;

impl CheckType for InvalidCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["invalid_count", "invalid_percent"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        node.require_column(log)?;
        let validity = node.validity(log);
        let validity = if validity.is_configured() {
            Some(validity)
        } else {
            log.error_with_docs(
                format!(
                    "Check type '{}' requires 'valid_values', 'valid_regex', 'valid_min' or 'valid_max'",
                    node.header.type_name
                ),
                Some(&node.header.location),
                COLUMNS_DOCS,
            );
            None
        };

        Some(Box::new(InvalidDefinition {
            header: node.header.clone(),
            missing: node.missing(log),
            validity,
            threshold: node.threshold(Some(Threshold::must_be(0.0)), log),
            percent: node.header.type_name == "invalid_percent",
        }))
    }
}

#[derive(Debug)]
struct InvalidDefinition {
    header: CheckHeader,
    missing: MissingConfiguration,
    validity: Option<ValidityConfiguration>,
    threshold: Option<Threshold>,
    percent: bool,
}

impl CheckDefinition for InvalidDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let label = if self.percent {
            "invalid_percent"
        } else {
            "invalid_count"
        };
        let Some(validity) = &self.validity else {
            return Box::new(UnevaluableCheck::new(
                self.header.clone(),
                format!("{} (no validity configured)", label),
                "No validity configured".to_string(),
            ));
        };

        let count = ctx.aggregation(
            &self.header,
            Box::new(InvalidCountMeasure {
                missing: self.missing.clone(),
                validity: validity.clone(),
            }),
        );
        if !self.percent {
            return Box::new(ThresholdCheck::new(
                self.header.clone(),
                label,
                self.threshold.clone(),
                Arc::clone(&count),
                vec![count],
            ));
        }

        let row_count = ctx.row_count(&self.header);
        let percent = ctx.percentage(label, &count, &row_count);
        Box::new(ThresholdCheck::new(
            self.header.clone(),
            label,
            self.threshold.clone(),
            Arc::clone(&percent),
            vec![count, row_count, percent],
        ))
    }
}
