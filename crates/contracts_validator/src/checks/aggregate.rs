use super::{BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType, ThresholdCheck};
use crate::AggregationMeasure;
use crate::contract::CHECK_TYPES_DOCS;
use contracts_core::{DiagnosticsLog, Threshold};
use contracts_sql::{Literal, SqlExpr};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "avg" => Some(AggregateFunction::Avg),
            "sum" => Some(AggregateFunction::Sum),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plain aggregate function over one column.
#[derive(Debug)]
pub struct AggregateMeasure {
    pub function: AggregateFunction,
}

impl AggregationMeasure for AggregateMeasure {
    fn metric_type(&self) -> &'static str {
        self.function.name()
    }

    fn sql_expression(&self, column: Option<&str>) -> SqlExpr {
        let Some(column) = column else {
            return SqlExpr::Literal(Literal::Null);
        };
        let column = SqlExpr::column(column);
        match self.function {
            AggregateFunction::Avg => SqlExpr::avg(column),
            AggregateFunction::Sum => SqlExpr::sum(column),
            AggregateFunction::Min => SqlExpr::min(column),
            AggregateFunction::Max => SqlExpr::max(column),
        }
    }
}

/// `aggregate`: `function` (avg, sum, min, max) of a column against a
/// mandatory threshold.
pub struct AggregateCheckType;

impl CheckType for AggregateCheckType {
    fn names(&self) -> &'static [&'static str] {
        &["aggregate"]
    }

    fn parse(&self, node: &CheckNode<'_>, log: &DiagnosticsLog) -> Option<Box<dyn CheckDefinition>> {
        let column = node.require_column(log)?;
        let function_name = node.object.read_string("function", log)?;
        let Some(function) = AggregateFunction::parse(function_name.as_str()) else {
            log.error_with_docs(
                format!(
                    "Unknown aggregate function '{}', use one of avg, sum, min, max",
                    function_name.as_str()
                ),
                Some(&function_name.location),
                CHECK_TYPES_DOCS,
            );
            return None;
        };

        Some(Box::new(AggregateDefinition {
            label: format!("{}({})", function, column.name),
            header: node.header.clone(),
            function,
            threshold: node.threshold(None, log),
        }))
    }
}

#[derive(Debug)]
struct AggregateDefinition {
    header: CheckHeader,
    label: String,
    function: AggregateFunction,
    threshold: Option<Threshold>,
}

impl CheckDefinition for AggregateDefinition {
    fn header(&self) -> &CheckHeader {
        &self.header
    }

    fn build(&self, ctx: &mut BuildContext<'_>) -> Box<dyn Check> {
        let metric = ctx.aggregation(
            &self.header,
            Box::new(AggregateMeasure {
                function: self.function,
            }),
        );
        Box::new(ThresholdCheck::new(
            self.header.clone(),
            &self.label,
            self.threshold.clone(),
            Arc::clone(&metric),
            vec![metric],
        ))
    }
}
