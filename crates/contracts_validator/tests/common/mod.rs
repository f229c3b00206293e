//! Shared helpers for the validator integration tests.

use async_trait::async_trait;
use contracts_sql::AnsiDialect;
use contracts_validator::{ConnectionError, DataSource, DataSourceConnection, QueryResult, ScalarValue};
use std::sync::{Arc, Mutex};

type Answer = dyn Fn(&str) -> Result<ScalarValue, String> + Send + Sync;

/// Connection that records every statement and answers each `SELECT`
/// expression through a closure.
///
/// The closure sees one select item at a time, e.g. `COUNT(*)`. Returning
/// `Err` fails the whole statement. Metadata queries return `schema`.
pub struct RecordingConnection {
    answer: Box<Answer>,
    schema: Vec<(String, String)>,
    queries: Mutex<Vec<String>>,
    updates: Mutex<Vec<String>>,
}

impl RecordingConnection {
    pub fn new(answer: impl Fn(&str) -> Result<ScalarValue, String> + Send + Sync + 'static) -> Self {
        Self {
            answer: Box::new(answer),
            schema: Vec::new(),
            queries: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn with_schema(mut self, columns: &[(&str, &str)]) -> Self {
        self.schema = columns
            .iter()
            .map(|(name, data_type)| (name.to_string(), data_type.to_string()))
            .collect();
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }
}

/// Select items of a statement rendered by the dialects.
pub fn select_items(sql: &str) -> Vec<&str> {
    let select = sql
        .strip_prefix("SELECT ")
        .and_then(|rest| rest.split("\nFROM ").next())
        .unwrap_or_default();
    select.split(",\n       ").collect()
}

#[async_trait]
impl DataSourceConnection for RecordingConnection {
    async fn execute_update(&self, sql: &str) -> Result<(), ConnectionError> {
        self.updates.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ConnectionError> {
        self.queries.lock().unwrap().push(sql.to_string());

        if sql.contains("information_schema") {
            let rows = self
                .schema
                .iter()
                .map(|(name, data_type)| {
                    vec![
                        ScalarValue::String(name.clone()),
                        ScalarValue::String(data_type.clone()),
                    ]
                })
                .collect();
            return Ok(QueryResult::new(
                vec!["column_name".to_string(), "data_type".to_string()],
                rows,
            ));
        }

        let items = select_items(sql);
        let row = items
            .iter()
            .map(|item| (self.answer)(item))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| ConnectionError::query(sql, message))?;
        let columns = (0..row.len()).map(|i| format!("col_{i}")).collect();
        Ok(QueryResult::new(columns, vec![row]))
    }
}

/// Answers `COUNT(*)` with `rows` and every `SUM(CASE ...)` with `flagged`.
pub fn counts(rows: i64, flagged: i64) -> impl Fn(&str) -> Result<ScalarValue, String> + Send + Sync {
    move |item: &str| {
        if item == "COUNT(*)" {
            Ok(ScalarValue::Integer(rows))
        } else if item.starts_with("SUM(CASE") {
            Ok(if rows == 0 {
                ScalarValue::Null
            } else {
                ScalarValue::Integer(flagged)
            })
        } else {
            Err(format!("unexpected select item {item}"))
        }
    }
}

pub fn warehouse(connection: Arc<RecordingConnection>) -> DataSource {
    DataSource::new("warehouse", Arc::new(AnsiDialect), connection)
}
