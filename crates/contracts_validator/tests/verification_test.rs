//! Integration tests for full verification runs against a recording connection.

mod common;

use common::{RecordingConnection, counts, select_items, warehouse};
use contracts_core::{Severity, SourceLocation, VerificationContext};
use contracts_sql::{PostgresDialect, TableRef};
use contracts_validator::{CheckOutcome, ContractVerification, ScalarValue};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;

const ORDERS: &str = "\
dataset: orders
columns:
  - name: id
  - name: customer_id
checks:
  - type: row_count
  - type: missing_count
    column: customer_id
    must_be: 0
  - type: missing_count
    column: customer_id
    must_be_less_than_or_equal: 5
  - type: missing_percent
    column: customer_id
    must_be_less_than: 5
";

fn outcomes(report: &contracts_validator::VerificationReport) -> Vec<CheckOutcome> {
    report.check_results().map(|result| result.outcome).collect()
}

#[tokio::test]
async fn test_shared_metrics_are_queried_once() {
    let connection = Arc::new(RecordingConnection::new(counts(100, 3)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", ORDERS)
        .with_data_source(warehouse(Arc::clone(&connection)))
        .execute()
        .await;

    let queries = connection.queries();
    assert_eq!(queries.len(), 1);
    // row_count and missing_count, each rendered once
    assert_eq!(select_items(&queries[0]).len(), 2);
    assert_eq!(report.executed_sql, queries);

    assert_eq!(
        outcomes(&report),
        vec![
            CheckOutcome::Passed,
            CheckOutcome::Failed,
            CheckOutcome::Passed,
            CheckOutcome::Passed,
        ]
    );
    let results: Vec<_> = report.check_results().collect();
    assert_eq!(results[1].summary, "missing_count must be 0");
    assert_eq!(results[1].diagnostic_lines, vec!["Actual missing_count was 3"]);
    assert_eq!(results[2].diagnostic_lines, vec!["Actual missing_count was 3"]);
    assert!(!report.is_ok());
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_must_be_is_an_exact_match() {
    let yaml = "\
dataset: orders
columns:
  - name: customer_id
checks:
  - type: missing_count
    column: customer_id
    must_be: 5
  - type: missing_count
    column: customer_id
    must_be: 3
";
    let connection = Arc::new(RecordingConnection::new(counts(100, 3)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(connection))
        .execute()
        .await;

    assert_eq!(outcomes(&report), vec![CheckOutcome::Failed, CheckOutcome::Passed]);
    let results: Vec<_> = report.check_results().collect();
    assert_eq!(results[0].summary, "missing_count must be 5");
    assert_eq!(results[0].diagnostic_lines, vec!["Actual missing_count was 3"]);
}

#[tokio::test]
async fn test_missing_percent_of_empty_dataset() {
    let connection = Arc::new(RecordingConnection::new(counts(0, 0)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", ORDERS)
        .with_data_source(warehouse(connection))
        .execute()
        .await;

    let results: Vec<_> = report.check_results().collect();
    // row_count must be greater than 0
    assert_eq!(results[0].outcome, CheckOutcome::Failed);
    assert_eq!(results[3].outcome, CheckOutcome::NotEvaluated);
    assert_eq!(
        results[3].diagnostic_lines.last().map(String::as_str),
        Some("missing_percent is not evaluated because row_count was 0")
    );
}

#[tokio::test]
async fn test_unknown_check_type_is_reported_once_and_others_run() {
    let yaml = "\
dataset: orders
checks:
  - type: row_count
  - type: unknown_check
  - type: row_count
    must_be_greater_than: 10
";
    let connection = Arc::new(RecordingConnection::new(counts(42, 0)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(connection))
        .execute()
        .await;

    let errors: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Unknown check type 'unknown_check'");
    assert_eq!(errors[0].location, Some(SourceLocation::new("orders.yml", 4, 11)));

    assert_eq!(outcomes(&report), vec![CheckOutcome::Passed, CheckOutcome::Passed]);
    assert!(report.has_errors());
    assert!(!report.is_ok());
}

#[tokio::test]
async fn test_invalid_email_is_located_and_checks_still_run() {
    let yaml = "\
dataset: orders
owner_email: not-an-email
checks:
  - type: row_count
";
    let connection = Arc::new(RecordingConnection::new(counts(5, 0)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(connection))
        .execute()
        .await;

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].message, "Invalid email");
    assert_eq!(
        report.diagnostics[0].location,
        Some(SourceLocation::new("orders.yml", 2, 14))
    );
    assert_eq!(outcomes(&report), vec![CheckOutcome::Passed]);
}

#[tokio::test]
async fn test_query_failure_only_affects_its_dataset() {
    let customers = "\
dataset: customers
checks:
  - type: row_count
";
    let orders = "\
dataset: orders
checks:
  - type: row_count
  - type: missing_count
    column: customer_id
";
    // Only the orders statement has a SUM(CASE ...) item
    let connection = Arc::new(RecordingConnection::new(|item: &str| {
        if item.starts_with("SUM(CASE") {
            Err("relation \"orders\" does not exist".to_string())
        } else {
            Ok(ScalarValue::Integer(7))
        }
    }));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", orders)
        .with_contract_yaml_str("customers.yml", customers)
        .with_data_source(warehouse(Arc::clone(&connection)))
        .execute()
        .await;

    assert_eq!(connection.queries().len(), 2);
    let orders_result = &report.contract_results[0];
    assert_eq!(orders_result.dataset, "orders");
    assert_eq!(orders_result.count(CheckOutcome::Error), 2);
    assert!(orders_result.check_results[0].diagnostic_lines[0].starts_with("Could not compute row_count"));

    let customers_result = &report.contract_results[1];
    assert_eq!(customers_result.count(CheckOutcome::Passed), 1);
}

#[tokio::test]
async fn test_filters_are_queried_separately() {
    let yaml = "\
dataset: orders
checks:
  - type: row_count
  - type: row_count
    filter: status = 'open'
";
    let connection = Arc::new(RecordingConnection::new(counts(10, 0)));
    ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(Arc::clone(&connection)))
        .execute()
        .await;

    assert_eq!(
        connection.queries(),
        vec![
            "SELECT COUNT(*)\nFROM \"orders\";",
            "SELECT COUNT(*)\nFROM \"orders\"\nWHERE (status = 'open');",
        ]
    );
}

#[tokio::test]
async fn test_unknown_data_source() {
    let yaml = "\
dataset: orders
data_source: lake
checks:
  - type: row_count
";
    let connection = Arc::new(RecordingConnection::new(counts(10, 0)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(Arc::clone(&connection)))
        .execute()
        .await;

    assert!(connection.queries().is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].message, "Unknown data source 'lake'");
    assert_eq!(
        report.diagnostics[0].location,
        Some(SourceLocation::new("orders.yml", 2, 14))
    );
    assert_eq!(outcomes(&report), vec![CheckOutcome::Error]);
}

#[tokio::test]
async fn test_structural_error_does_not_stop_other_contracts() {
    let connection = Arc::new(RecordingConnection::new(counts(10, 0)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("broken.yml", "checks:\n  - type: row_count\n")
        .with_contract_yaml_str("orders.yml", "dataset: orders\nchecks:\n  - type: row_count\n")
        .with_data_source(warehouse(connection))
        .execute()
        .await;

    assert_eq!(report.contract_results.len(), 1);
    assert_eq!(report.contract_results[0].source, "orders.yml");
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].message, "'dataset' is required");
}

#[tokio::test]
async fn test_variables_are_substituted() {
    let yaml = "\
dataset: ${TABLE}
schema: ${SCHEMA}
checks:
  - type: row_count
";
    let connection = Arc::new(RecordingConnection::new(counts(10, 0)));
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(Arc::clone(&connection)))
        .with_context(
            VerificationContext::new()
                .with_variable("TABLE", "orders")
                .with_variable("SCHEMA", "sales"),
        )
        .execute()
        .await;

    assert_eq!(report.contract_results[0].dataset, "sales.orders");
    assert_eq!(
        connection.queries(),
        vec!["SELECT COUNT(*)\nFROM \"sales\".\"orders\";"]
    );
}

#[tokio::test]
async fn test_schema_check_reads_metadata() {
    let yaml = "\
dataset: orders
columns:
  - name: id
    data_type: integer
  - name: status
checks:
  - type: schema
";
    let connection = Arc::new(
        RecordingConnection::new(counts(10, 0))
            .with_schema(&[("id", "integer"), ("status", "varchar")]),
    );
    let report = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", yaml)
        .with_data_source(warehouse(Arc::clone(&connection)))
        .execute()
        .await;

    assert_eq!(connection.queries().len(), 1);
    assert!(connection.queries()[0].contains("\"information_schema\".\"columns\""));
    assert_eq!(outcomes(&report), vec![CheckOutcome::Passed]);
}

#[tokio::test]
async fn test_contract_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.yml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"dataset: orders\nchecks:\n  - type: row_count\n")
        .unwrap();

    let connection = Arc::new(RecordingConnection::new(counts(3, 0)));
    let report = ContractVerification::new()
        .with_contract_file(&path)
        .with_data_source(warehouse(connection))
        .execute()
        .await;

    assert_eq!(report.contract_results[0].source, path.display().to_string());
    assert!(report.is_ok());
}

#[tokio::test]
async fn test_missing_contract_file_is_a_diagnostic() {
    let report = ContractVerification::new()
        .with_contract_file("does/not/exist.yml")
        .execute()
        .await;

    assert!(report.contract_results.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].message.starts_with("Failed to read contract"));
}

#[tokio::test]
async fn test_compile_sql_without_connection() {
    let compiled = ContractVerification::new()
        .with_contract_yaml_str("orders.yml", ORDERS)
        .with_context(VerificationContext::new().with_default_data_source("warehouse"))
        .compile_sql(&PostgresDialect)
        .await;

    assert!(!compiled.has_errors());
    assert_eq!(compiled.statements.len(), 1);
    assert_eq!(compiled.statements[0].data_source, "warehouse");
    assert_eq!(compiled.statements[0].dataset, "orders");
    assert_eq!(
        compiled.statements[0].sql,
        "SELECT COUNT(*),\n       SUM(CASE WHEN \"customer_id\" IS NULL THEN 1 ELSE 0 END)\nFROM \"orders\";"
    );
}

#[tokio::test]
async fn test_drop_table_uses_update_path() {
    let connection = Arc::new(RecordingConnection::new(counts(0, 0)));
    let data_source = warehouse(Arc::clone(&connection));

    data_source
        .drop_table(&TableRef::new("orders").with_schema("staging"))
        .await
        .unwrap();

    assert_eq!(connection.updates(), vec!["DROP TABLE \"staging\".\"orders\";"]);
    assert!(connection.queries().is_empty());
}
