//! Metrics: the quantities checks compare against their thresholds.
//!
//! A metric is identified by an explicit structural [`MetricKey`]. Checks never
//! create the metrics they read directly; they hand a candidate to the
//! [`crate::MetricResolver`] and keep the canonical instance it returns, so two
//! checks asking for the same computation share one value slot.

use crate::ScalarValue;
use contracts_sql::{MetadataColumn, SqlExpr, TableRef};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// One aggregate expression computed over a dataset.
///
/// Implementations describe the SQL and how raw backend values are
/// normalized; the configuration they return is part of the metric identity.
pub trait AggregationMeasure: fmt::Debug + Send + Sync {
    /// Metric type name, e.g. `missing_count`.
    fn metric_type(&self) -> &'static str;

    /// Type-specific configuration, folded into the metric key as a digest.
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Aggregate expression for `column` (or the whole row for `None`).
    fn sql_expression(&self, column: Option<&str>) -> SqlExpr;

    /// Normalizes the raw backend value.
    fn normalize(&self, raw: ScalarValue) -> ScalarValue {
        raw
    }
}

/// Structural identity of a metric within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKey {
    Aggregation {
        data_source: String,
        dataset: TableRef,
        column: Option<String>,
        metric_type: String,
        filter: Option<String>,
        config_digest: String,
    },
    Derived {
        name: String,
        inputs: Vec<MetricKey>,
    },
    Schema {
        data_source: String,
        dataset: TableRef,
    },
}

/// How a derived metric combines its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedFunction {
    /// `inputs[0] * 100 / inputs[1]`, no value when the total is zero
    Percentage,
}

#[derive(Debug)]
pub struct AggregationMetric {
    pub data_source: String,
    pub dataset: TableRef,
    pub column: Option<String>,
    pub filter: Option<String>,
    pub measure: Box<dyn AggregationMeasure>,
}

impl AggregationMetric {
    pub fn sql_expression(&self) -> SqlExpr {
        self.measure.sql_expression(self.column.as_deref())
    }
}

#[derive(Debug)]
pub struct DerivedMetric {
    pub name: String,
    pub function: DerivedFunction,
    pub inputs: Vec<Arc<Metric>>,
}

#[derive(Debug)]
pub struct SchemaMetric {
    pub data_source: String,
    pub dataset: TableRef,
}

#[derive(Debug)]
pub enum MetricKind {
    Aggregation(AggregationMetric),
    Derived(DerivedMetric),
    Schema(SchemaMetric),
}

/// Computed value of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(ScalarValue),
    Columns(Vec<MetadataColumn>),
}

/// A metric and its write-once value slot.
#[derive(Debug)]
pub struct Metric {
    key: MetricKey,
    kind: MetricKind,
    state: OnceLock<Result<MetricValue, String>>,
}

impl Metric {
    pub fn aggregation(
        data_source: impl Into<String>,
        dataset: TableRef,
        column: Option<String>,
        filter: Option<String>,
        measure: Box<dyn AggregationMeasure>,
    ) -> Self {
        let data_source = data_source.into();
        let key = MetricKey::Aggregation {
            data_source: data_source.clone(),
            dataset: dataset.clone(),
            column: column.clone(),
            metric_type: measure.metric_type().to_string(),
            filter: filter.clone(),
            config_digest: config_digest(&measure.config()),
        };
        Self::with_kind(
            key,
            MetricKind::Aggregation(AggregationMetric {
                data_source,
                dataset,
                column,
                filter,
                measure,
            }),
        )
    }

    /// Percentage of `fraction` over `total`.
    pub fn percentage(name: impl Into<String>, fraction: Arc<Metric>, total: Arc<Metric>) -> Self {
        let name = name.into();
        let key = MetricKey::Derived {
            name: name.clone(),
            inputs: vec![fraction.key.clone(), total.key.clone()],
        };
        Self::with_kind(
            key,
            MetricKind::Derived(DerivedMetric {
                name,
                function: DerivedFunction::Percentage,
                inputs: vec![fraction, total],
            }),
        )
    }

    /// Column names and types of a dataset.
    pub fn schema(data_source: impl Into<String>, dataset: TableRef) -> Self {
        let data_source = data_source.into();
        let key = MetricKey::Schema {
            data_source: data_source.clone(),
            dataset: dataset.clone(),
        };
        Self::with_kind(
            key,
            MetricKind::Schema(SchemaMetric {
                data_source,
                dataset,
            }),
        )
    }

    fn with_kind(key: MetricKey, kind: MetricKind) -> Self {
        Self {
            key,
            kind,
            state: OnceLock::new(),
        }
    }

    pub fn key(&self) -> &MetricKey {
        &self.key
    }

    pub fn kind(&self) -> &MetricKind {
        &self.kind
    }

    /// Display name: metric type, derived name or `schema`.
    pub fn name(&self) -> &str {
        match &self.kind {
            MetricKind::Aggregation(aggregation) => aggregation.measure.metric_type(),
            MetricKind::Derived(derived) => &derived.name,
            MetricKind::Schema(_) => "schema",
        }
    }

    fn store(&self, state: Result<MetricValue, String>) {
        if self.state.set(state).is_err() {
            trace!(metric = self.name(), "Metric value already set, keeping the first");
        }
    }

    /// Stores a query result, normalized by the measure.
    pub fn set_value(&self, raw: ScalarValue) {
        let value = match &self.kind {
            MetricKind::Aggregation(aggregation) => aggregation.measure.normalize(raw),
            MetricKind::Derived(_) | MetricKind::Schema(_) => raw,
        };
        self.store(Ok(MetricValue::Scalar(value)));
    }

    pub fn set_columns(&self, columns: Vec<MetadataColumn>) {
        self.store(Ok(MetricValue::Columns(columns)));
    }

    /// Marks the metric as failed, e.g. because its query failed.
    pub fn set_error(&self, message: impl Into<String>) {
        self.store(Err(message.into()));
    }

    /// Computes a derived metric from its inputs. No-op for other kinds.
    pub fn compute(&self) {
        let MetricKind::Derived(derived) = &self.kind else {
            return;
        };
        if let Some(message) = derived.inputs.iter().find_map(|input| input.error()) {
            self.set_error(message.to_string());
            return;
        }
        match derived.function {
            DerivedFunction::Percentage => {
                let fraction = derived.inputs.first().and_then(|m| m.number());
                let total = derived.inputs.get(1).and_then(|m| m.number());
                let value = match (fraction, total) {
                    (Some(fraction), Some(total)) if total != 0.0 => {
                        ScalarValue::Float(fraction * 100.0 / total)
                    }
                    _ => ScalarValue::Null,
                };
                self.set_value(value);
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn value(&self) -> Option<&MetricValue> {
        self.state.get().and_then(|state| state.as_ref().ok())
    }

    pub fn error(&self) -> Option<&str> {
        self.state
            .get()
            .and_then(|state| state.as_ref().err())
            .map(String::as_str)
    }

    pub fn scalar(&self) -> Option<&ScalarValue> {
        match self.value() {
            Some(MetricValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<f64> {
        self.scalar().and_then(ScalarValue::as_f64)
    }

    pub fn columns(&self) -> Option<&[MetadataColumn]> {
        match self.value() {
            Some(MetricValue::Columns(columns)) => Some(columns),
            _ => None,
        }
    }
}

/// Hex SHA-256 of the canonical JSON form of a measure configuration.
pub fn config_digest(config: &serde_json::Value) -> String {
    hex::encode(Sha256::digest(config.to_string().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct CountStar;

    impl AggregationMeasure for CountStar {
        fn metric_type(&self) -> &'static str {
            "row_count"
        }

        fn sql_expression(&self, _column: Option<&str>) -> SqlExpr {
            SqlExpr::count(SqlExpr::Star)
        }

        fn normalize(&self, raw: ScalarValue) -> ScalarValue {
            if raw.is_null() {
                ScalarValue::Integer(0)
            } else {
                raw
            }
        }
    }

    fn row_count() -> Arc<Metric> {
        Arc::new(Metric::aggregation(
            "warehouse",
            TableRef::new("orders"),
            None,
            None,
            Box::new(CountStar),
        ))
    }

    #[test]
    fn test_set_value_normalizes_null() {
        let metric = row_count();
        metric.set_value(ScalarValue::Null);
        assert_eq!(metric.number(), Some(0.0));
    }

    #[test]
    fn test_value_slot_is_write_once() {
        let metric = row_count();
        metric.set_value(ScalarValue::Integer(10));
        metric.set_error("late failure");
        assert_eq!(metric.number(), Some(10.0));
        assert_eq!(metric.error(), None);
    }

    #[test]
    fn test_percentage() {
        let fraction = row_count();
        let total = Arc::new(Metric::aggregation(
            "warehouse",
            TableRef::new("orders"),
            None,
            Some("amount > 0".to_string()),
            Box::new(CountStar),
        ));
        fraction.set_value(ScalarValue::Integer(3));
        total.set_value(ScalarValue::Integer(12));

        let percent = Metric::percentage("missing_percent", fraction, total);
        percent.compute();
        assert_eq!(percent.number(), Some(25.0));
    }

    #[test]
    fn test_percentage_of_zero_total_has_no_value() {
        let fraction = row_count();
        let total = row_count();
        fraction.set_value(ScalarValue::Integer(0));
        total.set_value(ScalarValue::Integer(0));

        let percent = Metric::percentage("missing_percent", fraction, total);
        percent.compute();
        assert!(percent.is_resolved());
        assert_eq!(percent.number(), None);
    }

    #[test]
    fn test_percentage_propagates_input_errors() {
        let fraction = row_count();
        let total = row_count();
        fraction.set_error("connection lost");

        let percent = Metric::percentage("missing_percent", fraction, total);
        percent.compute();
        assert_eq!(percent.error(), Some("connection lost"));
    }

    #[test]
    fn test_config_digest_is_stable() {
        let a = config_digest(&serde_json::json!({"missing_values": ["N/A"]}));
        let b = config_digest(&serde_json::json!({"missing_values": ["N/A"]}));
        let c = config_digest(&serde_json::json!({"missing_values": ["-"]}));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_config_digest_hashes_the_json_text() {
        let config = serde_json::json!({"missing_values": ["N/A"], "missing_regex": "^-$"});
        assert_eq!(
            config_digest(&config),
            hex::encode(Sha256::digest(config.to_string().as_bytes()))
        );
        assert_ne!(config_digest(&config), hex::encode(Sha256::digest(b"")));
        assert_ne!(config_digest(&serde_json::Value::Null), hex::encode(Sha256::digest(b"")));
    }
}
