//! Connection collaborator: the only place SQL meets a backend.

use crate::ConnectionError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use contracts_sql::{DropTable, SqlDialect, TableRef};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A single typed cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Integer(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Interprets the value as an instant.
    ///
    /// Dates map to midnight UTC, integers to unix epoch seconds (or
    /// milliseconds when large) and strings are parsed leniently.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ScalarValue::Timestamp(ts) => Some(*ts),
            ScalarValue::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc)),
            ScalarValue::Integer(epoch) => epoch_to_timestamp(*epoch),
            ScalarValue::String(text) => parse_timestamp(text),
            ScalarValue::Null | ScalarValue::Boolean(_) | ScalarValue::Float(_) => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Integer(i) => write!(f, "{}", i),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::String(s) => write!(f, "{}", s),
            ScalarValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            ScalarValue::Date(d) => write!(f, "{}", d),
        }
    }
}

fn epoch_to_timestamp(epoch: i64) -> Option<DateTime<Utc>> {
    // Values this large are milliseconds
    if epoch > 10_000_000_000 {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

/// Parses a timestamp string.
///
/// Supported formats: RFC 3339, unix epoch (seconds or milliseconds),
/// `YYYY-MM-DD HH:MM:SS[.fff]` and `YYYY-MM-DD`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(epoch) = text.parse::<i64>() {
        return epoch_to_timestamp(epoch);
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Rows returned by a query, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<ScalarValue>>) -> Self {
        Self { columns, rows }
    }

    /// First row, if any.
    pub fn first_row(&self) -> Option<&[ScalarValue]> {
        self.rows.first().map(Vec::as_slice)
    }
}

/// Executes SQL against a backend.
///
/// Implementations own timeouts and retries. Every failure is returned as a
/// [`ConnectionError`]; the orchestrator treats it as fatal for the dataset
/// group that issued the statement.
#[async_trait]
pub trait DataSourceConnection: Send + Sync {
    /// Runs a statement that returns no rows.
    async fn execute_update(&self, sql: &str) -> Result<(), ConnectionError>;

    /// Runs a query and returns its rows.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ConnectionError>;
}

/// A named backend: how to render SQL for it and how to reach it.
#[derive(Clone)]
pub struct DataSource {
    pub name: String,
    pub dialect: Arc<dyn SqlDialect>,
    pub connection: Arc<dyn DataSourceConnection>,
}

impl DataSource {
    pub fn new(
        name: impl Into<String>,
        dialect: Arc<dyn SqlDialect>,
        connection: Arc<dyn DataSourceConnection>,
    ) -> Self {
        Self {
            name: name.into(),
            dialect,
            connection,
        }
    }

    /// Drops `table` through the connection's update path.
    pub async fn drop_table(&self, table: &TableRef) -> Result<(), ConnectionError> {
        let sql = DropTable::new(table.clone()).build_sql(self.dialect.as_ref());
        debug!(data_source = %self.name, sql = %sql, "Dropping table");
        self.connection.execute_update(&sql).await
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("name", &self.name)
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}
