use super::{
    BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType, ThresholdCheck,
    zero_if_null,
};
use crate::{AggregationMeasure, ScalarValue};
use contracts_core::{DiagnosticsLog, Threshold};
use contracts_sql::{Literal, SqlExpr};
use std::sync::Arc;

/// `COUNT(col) - COUNT(DISTINCT col)`
#[derive(Debug)]
pub struct DuplicateCountMeasure;

impl AggregationMeasure for DuplicateCountMeasure {
    fn metric_type(&self) -> &'static str {
        "duplicate_count"
    }

    fn sql_expression(&self, column: Option<&str>) -> SqlExpr {
        match column {
            Some(column) => SqlExpr::minus(
                SqlExpr::count(SqlExpr::column(column)),
                SqlExpr::count_distinct(SqlExpr::column(column)),
            ),
            None => SqlExpr::Literal(Literal::Null),
        }
    }

    fn normalize(&self, raw: ScalarValue) -> ScalarValue {
        zero_if_null(raw)
    }
}

/// `duplicate_count` and `duplicate_percent`, by default required to be 0.
pub struct DuplicateCheckType;

impl CheckType for DuplicateCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["duplicate_count", "duplicate_percent"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        node.require_column(log)?;
        Some(Box::new(DuplicateDefinition {
            header: node.header.clone(),
            threshold: node.threshold(Some(Threshold::must_be(0.0)), log),
            percent: node.header.type_name == "duplicate_percent",
        }))
    }
}

#[derive(Debug)]
struct DuplicateDefinition {
    header: CheckHeader,
    threshold: Option<Threshold>,
    percent: bool,
}

impl CheckDefinition for DuplicateDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let count = ctx.aggregation(&self.header, Box::new(DuplicateCountMeasure));
        if !self.percent {
            return Box::new(ThresholdCheck::new(
                self.header.clone(),
                "duplicate_count",
                self.threshold.clone(),
                Arc::clone(&count),
                vec![count],
            ));
        }

        let row_count = ctx.row_count(&self.header);
        let percent = ctx.percentage("duplicate_percent", &count, &row_count);
        Box::new(ThresholdCheck::new(
            self.header.clone(),
            "duplicate_percent",
            self.threshold.clone(),
            Arc::clone(&percent),
            vec![count, row_count, percent],
        ))
    }
}
