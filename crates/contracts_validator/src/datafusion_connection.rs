//! DataFusion-backed connection.
//!
//! Runs contract SQL in-process against CSV files, Parquet files or Arrow
//! record batches registered as tables. The `information_schema` is enabled so
//! schema checks work the same way they do against a warehouse.

use crate::{ConnectionError, DataSourceConnection, QueryResult, ScalarValue};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::{DataType, TimeUnit};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionConfig, SessionContext};
use tracing::{debug, warn};

/// A [`DataSourceConnection`] over a DataFusion [`SessionContext`].
///
/// # Example
///
/// ```rust,no_run
/// use contracts_validator::{DataFusionConnection, DataSourceConnection};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = DataFusionConnection::new();
/// connection.register_csv("orders", "data/orders.csv").await?;
/// let result = connection.execute_query("SELECT COUNT(*) FROM orders;").await?;
/// println!("{:?}", result.rows);
/// # Ok(())
/// # }
/// ```
pub struct DataFusionConnection {
    ctx: SessionContext,
}

impl DataFusionConnection {
    /// Creates a session with `information_schema` enabled.
    pub fn new() -> Self {
        let config = SessionConfig::new().with_information_schema(true);
        Self {
            ctx: SessionContext::new_with_config(config),
        }
    }

    /// Underlying session, for registering custom table providers.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Registers a CSV file (with header row) as `table`.
    pub async fn register_csv(&self, table: &str, path: &str) -> Result<(), ConnectionError> {
        debug!(table, path, "Registering CSV table");
        self.ctx
            .register_csv(table, path, CsvReadOptions::new())
            .await
            .map_err(|e| ConnectionError::registration(table, e))
    }

    /// Registers a Parquet file or directory as `table`.
    pub async fn register_parquet(&self, table: &str, path: &str) -> Result<(), ConnectionError> {
        debug!(table, path, "Registering Parquet table");
        self.ctx
            .register_parquet(table, path, ParquetReadOptions::default())
            .await
            .map_err(|e| ConnectionError::registration(table, e))
    }

    /// Registers an in-memory record batch as `table`.
    pub fn register_batch(&self, table: &str, batch: RecordBatch) -> Result<(), ConnectionError> {
        debug!(table, rows = batch.num_rows(), "Registering in-memory table");
        self.ctx
            .register_batch(table, batch)
            .map(|_| ())
            .map_err(|e| ConnectionError::registration(table, e))
    }
}

impl Default for DataFusionConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSourceConnection for DataFusionConnection {
    async fn execute_update(&self, sql: &str) -> Result<(), ConnectionError> {
        let frame = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| ConnectionError::update(sql, e))?;
        frame
            .collect()
            .await
            .map_err(|e| ConnectionError::update(sql, e))?;
        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ConnectionError> {
        let frame = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| ConnectionError::query(sql, e))?;
        let columns: Vec<String> = frame
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        let batches = frame
            .collect()
            .await
            .map_err(|e| ConnectionError::query(sql, e))?;

        let mut rows = Vec::new();
        for batch in &batches {
            for row_idx in 0..batch.num_rows() {
                let row = batch
                    .columns()
                    .iter()
                    .zip(&columns)
                    .map(|(array, name)| arrow_value_to_scalar(array, row_idx, name))
                    .collect::<Result<Vec<_>, _>>()?;
                rows.push(row);
            }
        }

        Ok(QueryResult::new(columns, rows))
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, column: &str) -> Result<&'a T, ConnectionError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ConnectionError::unsupported_type(column, array.data_type()))
}

/// Converts one Arrow cell into a [`ScalarValue`].
pub fn arrow_value_to_scalar(
    array: &ArrayRef,
    row_idx: usize,
    column: &str,
) -> Result<ScalarValue, ConnectionError> {
    use arrow_array::array::*;

    if array.is_null(row_idx) {
        return Ok(ScalarValue::Null);
    }

    let value = match array.data_type() {
        DataType::Null => ScalarValue::Null,
        DataType::Boolean => {
            ScalarValue::Boolean(downcast::<BooleanArray>(array, column)?.value(row_idx))
        }
        DataType::Int8 => {
            ScalarValue::Integer(downcast::<Int8Array>(array, column)?.value(row_idx).into())
        }
        DataType::Int16 => {
            ScalarValue::Integer(downcast::<Int16Array>(array, column)?.value(row_idx).into())
        }
        DataType::Int32 => {
            ScalarValue::Integer(downcast::<Int32Array>(array, column)?.value(row_idx).into())
        }
        DataType::Int64 => ScalarValue::Integer(downcast::<Int64Array>(array, column)?.value(row_idx)),
        DataType::UInt8 => {
            ScalarValue::Integer(downcast::<UInt8Array>(array, column)?.value(row_idx).into())
        }
        DataType::UInt16 => {
            ScalarValue::Integer(downcast::<UInt16Array>(array, column)?.value(row_idx).into())
        }
        DataType::UInt32 => {
            ScalarValue::Integer(downcast::<UInt32Array>(array, column)?.value(row_idx).into())
        }
        DataType::UInt64 => {
            let value = downcast::<UInt64Array>(array, column)?.value(row_idx);
            match i64::try_from(value) {
                Ok(value) => ScalarValue::Integer(value),
                Err(_) => ScalarValue::Float(value as f64),
            }
        }
        DataType::Float32 => {
            ScalarValue::Float(downcast::<Float32Array>(array, column)?.value(row_idx).into())
        }
        DataType::Float64 => ScalarValue::Float(downcast::<Float64Array>(array, column)?.value(row_idx)),
        DataType::Decimal128(_, scale) => {
            let raw = downcast::<Decimal128Array>(array, column)?.value(row_idx);
            ScalarValue::Float(raw as f64 / 10f64.powi(i32::from(*scale)))
        }
        DataType::Utf8 => {
            ScalarValue::String(downcast::<StringArray>(array, column)?.value(row_idx).to_string())
        }
        DataType::LargeUtf8 => ScalarValue::String(
            downcast::<LargeStringArray>(array, column)?
                .value(row_idx)
                .to_string(),
        ),
        DataType::Utf8View => ScalarValue::String(
            downcast::<StringViewArray>(array, column)?
                .value(row_idx)
                .to_string(),
        ),
        DataType::Timestamp(unit, _) => {
            let timestamp = match unit {
                TimeUnit::Second => DateTime::from_timestamp(
                    downcast::<TimestampSecondArray>(array, column)?.value(row_idx),
                    0,
                ),
                TimeUnit::Millisecond => DateTime::from_timestamp_millis(
                    downcast::<TimestampMillisecondArray>(array, column)?.value(row_idx),
                ),
                TimeUnit::Microsecond => DateTime::from_timestamp_micros(
                    downcast::<TimestampMicrosecondArray>(array, column)?.value(row_idx),
                ),
                TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(
                    downcast::<TimestampNanosecondArray>(array, column)?.value(row_idx),
                )),
            };
            timestamp
                .map(|ts: DateTime<Utc>| ScalarValue::Timestamp(ts))
                .ok_or_else(|| ConnectionError::unsupported_type(column, "timestamp out of range"))?
        }
        DataType::Date32 => {
            let days = downcast::<Date32Array>(array, column)?.value(row_idx);
            NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
                .map(ScalarValue::Date)
                .ok_or_else(|| ConnectionError::unsupported_type(column, "date out of range"))?
        }
        DataType::Date64 => {
            let millis = downcast::<Date64Array>(array, column)?.value(row_idx);
            DateTime::from_timestamp_millis(millis)
                .map(|ts| ScalarValue::Date(ts.date_naive()))
                .ok_or_else(|| ConnectionError::unsupported_type(column, "date out of range"))?
        }
        other => {
            warn!(column, data_type = %other, "Unsupported Arrow type in query result");
            return Err(ConnectionError::unsupported_type(column, other));
        }
    };

    Ok(value)
}

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
