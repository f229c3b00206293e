use super::{
    BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType, ThresholdCheck,
    zero_if_null,
};
use crate::{AggregationMeasure, ScalarValue};
use contracts_core::{Comparator, DiagnosticsLog, Threshold};
use contracts_sql::SqlExpr;
use std::sync::Arc;

/// `COUNT(*)`
#[derive(Debug)]
pub struct RowCountMeasure;

impl AggregationMeasure for RowCountMeasure {
    fn metric_type(&self) -> &'static str {
        "row_count"
    }

    fn sql_expression(&self, _column: Option<&str>) -> SqlExpr {
        SqlExpr::count(SqlExpr::Star)
    }

    fn normalize(&self, raw: ScalarValue) -> ScalarValue {
        zero_if_null(raw)
    }
}

/// `row_count`: number of rows, by default required to be positive.
pub struct RowCountCheckType;

impl CheckType for RowCountCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["row_count"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        let default = Threshold::single(Comparator::GreaterThan, 0.0);
        Some(Box::new(RowCountDefinition {
            header: node.header.clone(),
            threshold: node.threshold(Some(default), log),
        }))
    }
}

#[derive(Debug)]
struct RowCountDefinition {
    header: CheckHeader,
    threshold: Option<Threshold>,
}

impl CheckDefinition for RowCountDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let row_count = ctx.row_count(&self.header);
        Box::new(ThresholdCheck::new(
            self.header.clone(),
            "row_count",
            self.threshold.clone(),
            Arc::clone(&row_count),
            vec![row_count],
        ))
    }
}
