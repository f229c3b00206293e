//! Integration tests for verification runs on the in-process DataFusion engine.

use arrow_array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use chrono::{TimeZone, Utc};
use contracts_core::VerificationContext;
use contracts_sql::{DataFusionDialect, TableRef};
use contracts_validator::{
    CheckOutcome, ContractVerification, DataFusionConnection, DataSource, DataSourceConnection,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Five orders: one duplicate id, two null customers plus one 'N/A',
/// one unknown status.
fn orders_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("customer_id", DataType::Utf8, true),
        Field::new("status", DataType::Utf8, true),
        Field::new("amount", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3, 4, 4])),
        Arc::new(StringArray::from(vec![Some("a"), None, Some("c"), None, Some("N/A")])),
        Arc::new(StringArray::from(vec![
            Some("open"),
            Some("closed"),
            Some("open"),
            Some("lost"),
            None,
        ])),
        Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0, 40.0, 50.0])),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

fn data_source(connection: DataFusionConnection) -> DataSource {
    DataSource::new("local", Arc::new(DataFusionDialect), Arc::new(connection))
}

const ORDERS: &str = "\
dataset: orders
columns:
  - name: id
    data_type: Int64
    checks:
      - type: duplicate_count
  - name: customer_id
    missing_values: ['N/A']
    checks:
      - type: missing_count
        must_be_less_than: 5
      - type: missing_percent
        must_be_less_than: 50
  - name: status
    valid_values: [open, closed]
    checks:
      - type: invalid_count
  - name: amount
checks:
  - type: row_count
  - type: aggregate
    column: amount
    function: avg
    must_be_between: [20, 40]
  - type: schema
";

#[tokio::test]
async fn test_orders_contract_end_to_end() {
    let connection = DataFusionConnection::new();
    connection.register_batch("orders", orders_batch()).unwrap();

    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", ORDERS)
        .with_data_source(data_source(connection))
        .execute()
        .await;

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    // One aggregation query plus the metadata query
    assert_eq!(report.executed_sql.len(), 2);

    let results: Vec<_> = report.check_results().collect();
    let summary: Vec<(&str, CheckOutcome)> = results
        .iter()
        .map(|result| (result.check_type.as_str(), result.outcome))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("duplicate_count", CheckOutcome::Failed),
            ("missing_count", CheckOutcome::Passed),
            ("missing_percent", CheckOutcome::Failed),
            ("invalid_count", CheckOutcome::Failed),
            ("row_count", CheckOutcome::Passed),
            ("aggregate", CheckOutcome::Passed),
            ("schema", CheckOutcome::Passed),
        ]
    );

    assert_eq!(results[0].diagnostic_lines, vec!["Actual duplicate_count was 1"]);
    assert_eq!(results[1].diagnostic_lines, vec!["Actual missing_count was 3"]);
    assert_eq!(results[2].diagnostic_lines[2], "Actual missing_percent was 60");
    assert_eq!(results[3].diagnostic_lines, vec!["Actual invalid_count was 1"]);
    assert_eq!(results[4].diagnostic_lines, vec!["Actual row_count was 5"]);
    assert_eq!(results[5].diagnostic_lines, vec!["Actual avg was 30"]);
    assert_eq!(report.count(CheckOutcome::Failed), 3);
}

#[tokio::test]
async fn test_schema_mismatch() {
    let connection = DataFusionConnection::new();
    connection.register_batch("orders", orders_batch()).unwrap();
    let yaml = "\
dataset: orders
columns:
  - name: id
    data_type: Utf8
  - name: customer_id
checks:
  - type: schema
";

    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(data_source(connection))
        .execute()
        .await;

    let result = report.check_results().next().unwrap();
    assert_eq!(result.outcome, CheckOutcome::Failed);
    assert!(result
        .diagnostic_lines
        .contains(&"Column 'id' has type 'Int64', expected 'Utf8'".to_string()));
    assert!(result
        .diagnostic_lines
        .contains(&"Column 'amount' is not declared".to_string()));
}

#[tokio::test]
async fn test_missing_table_errors_the_group() {
    let report = ContractVerification::new()
        .with_contract_yaml_str("ghost.yml", "dataset: ghost\nchecks:\n  - type: row_count\n")
        .with_data_source(data_source(DataFusionConnection::new()))
        .execute()
        .await;

    let result = report.check_results().next().unwrap();
    assert_eq!(result.outcome, CheckOutcome::Error);
    assert!(!report.is_ok());
}

#[tokio::test]
async fn test_csv_freshness_and_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.csv");
    std::fs::write(
        &path,
        "id,kind,updated_at\n1,click,2024-03-01 10:00:00\n2,view,2024-03-02 08:00:00\n3,click,2024-03-02 09:00:00\n",
    )
    .unwrap();

    let connection = DataFusionConnection::new();
    connection
        .register_csv("events", path.to_str().unwrap())
        .await
        .unwrap();

    let yaml = "\
dataset: events
checks:
  - type: freshness
    column: updated_at
    must_be_less_than: 24
  - type: row_count
    filter: kind = 'click'
    must_be: 2
";
    let report = ContractVerification::new()
        .with_contract_yaml_str("events.yml", yaml)
        .with_data_source(data_source(connection))
        .with_context(
            VerificationContext::new()
                .with_reference_time(Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap()),
        )
        .execute()
        .await;

    assert!(report.diagnostics.iter().all(|d| !d.is_error()), "{:?}", report.diagnostics);
    assert_eq!(report.executed_sql.len(), 2);

    let results: Vec<_> = report.check_results().collect();
    assert_eq!(results[0].outcome, CheckOutcome::Passed);
    assert_eq!(results[0].diagnostic_lines[2], "Actual freshness was 3.00 hours");
    assert_eq!(results[1].outcome, CheckOutcome::Passed);
    assert!(report.is_ok());
}

#[tokio::test]
async fn test_drop_table() {
    let connection = DataFusionConnection::new();
    connection
        .execute_update("CREATE TABLE scratch AS VALUES (1), (2)")
        .await
        .unwrap();
    let data_source = data_source(connection);

    data_source.drop_table(&TableRef::new("scratch")).await.unwrap();

    let err = data_source
        .connection
        .execute_query("SELECT COUNT(*) FROM scratch")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Query failed"));
}
