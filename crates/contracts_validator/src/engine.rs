//! Execution orchestrator.
//!
//! A run moves through strictly ordered stages. Each stage finishes for every
//! contract before the next one starts:
//!
//! 1. load and parse contract documents
//! 2. build checks, resolving the metrics they need to canonical instances
//! 3. group aggregation metrics by (data source, dataset) and execute one
//!    `SELECT` per distinct filter, plus a metadata query for schema checks
//! 4. compute derived metrics
//! 5. evaluate checks in document order
//!
//! Dataset groups run concurrently, bounded by the context's
//! `max_concurrency`. A failing statement marks every metric of its group as
//! failed; the other groups are unaffected.

use crate::checks::{BuildContext, Check, CheckTypeRegistry};
use crate::{
    Contract, ContractResult, DataSource, Metric, MetricKind, MetricResolver, QueryResult,
    VerificationError, VerificationReport,
};
use contracts_core::{ContractError, Diagnostic, DiagnosticsLog, Severity, VerificationContext};
use contracts_parser::{detect_format, parse_yaml_with_variables};
use contracts_sql::{
    FromClause, MetadataColumnsQuery, SqlClause, SqlDialect, SqlExpr, TableRef,
};
use futures::StreamExt;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

enum ContractSource {
    File(PathBuf),
    Text { file_id: String, text: String },
}

/// A verification run over one or more contracts.
///
/// # Example
///
/// ```rust,no_run
/// use contracts_sql::DataFusionDialect;
/// use contracts_validator::{ContractVerification, DataFusionConnection, DataSource};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = DataFusionConnection::new();
/// connection.register_csv("orders", "data/orders.csv").await?;
///
/// let report = ContractVerification::new()
///     .with_contract_file("contracts/orders.yml")
///     .with_data_source(DataSource::new(
///         "warehouse",
///         Arc::new(DataFusionDialect),
///         Arc::new(connection),
///     ))
///     .execute()
///     .await;
///
/// for result in report.check_results() {
///     println!("{}: {}", result.summary, result.outcome);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ContractVerification {
    sources: Vec<ContractSource>,
    data_sources: Vec<DataSource>,
    context: VerificationContext,
    registry: CheckTypeRegistry,
}

impl Default for ContractVerification {
    fn default() -> Self {
        Self::new()
    }
}

/// One statement of a compile-only run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub data_source: String,
    pub dataset: String,
    pub sql: String,
}

/// Statements a run would execute, and the diagnostics of building them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledSql {
    pub statements: Vec<CompiledStatement>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledSql {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

struct PlannedContract {
    contract: Contract,
    data_source: String,
    checks: Vec<Box<dyn Check>>,
}

impl ContractVerification {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            data_sources: Vec::new(),
            context: VerificationContext::default(),
            registry: CheckTypeRegistry::with_defaults(),
        }
    }

    /// Adds a contract file (`.yml`, `.yaml` or `.json`).
    pub fn with_contract_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ContractSource::File(path.into()));
        self
    }

    /// Adds contract text; `file_id` names it in diagnostics.
    pub fn with_contract_yaml_str(mut self, file_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.push(ContractSource::Text {
            file_id: file_id.into(),
            text: text.into(),
        });
        self
    }

    /// Registers a data source. A later source with the same name replaces it.
    pub fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_sources.retain(|existing| existing.name != data_source.name);
        self.data_sources.push(data_source);
        self
    }

    pub fn with_context(mut self, context: VerificationContext) -> Self {
        self.context = context;
        self
    }

    /// Replaces the check type registry.
    pub fn with_registry(mut self, registry: CheckTypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Runs every stage and returns the report. Never fails as a whole:
    /// problems end up as diagnostics or as ERROR check outcomes.
    pub async fn execute(&self) -> VerificationReport {
        let log = DiagnosticsLog::new();
        info!(contracts = self.sources.len(), "Starting verification run");

        // 1. Load and parse contracts
        let contracts = self.load(&log).await;

        // 2. Build checks and resolve their metrics
        let (planned, resolver) = self.build(contracts, &log);
        for contract in &planned {
            if let Err(err) = self.check_data_source(contract) {
                log.error(err.to_string(), err.location());
            }
        }

        // 3. Execute aggregation and schema metrics per dataset group
        let groups = plan_groups(resolver.metrics());
        debug!(groups = groups.len(), metrics = resolver.len(), "Executing metric groups");
        let executed_sql = self.execute_groups(groups).await;

        // 4. Derived metrics, inputs are registered before the metrics using them
        for metric in resolver.metrics() {
            if matches!(metric.kind(), MetricKind::Derived(_)) {
                metric.compute();
            }
        }

        // 5. Evaluate checks in document order
        debug!("Evaluating checks");
        let contract_results: Vec<ContractResult> = planned
            .iter()
            .map(|planned| ContractResult {
                source: planned.contract.source.clone(),
                dataset: planned.contract.dataset.to_string(),
                data_source: planned.data_source.clone(),
                check_results: planned.checks.iter().map(|check| check.evaluate()).collect(),
            })
            .collect();

        let report = VerificationReport {
            contract_results,
            diagnostics: log.sorted(),
            executed_sql,
            strict: self.context.strict,
        };
        info!(
            checks = report.check_results().count(),
            errors = log.count(Severity::Error),
            ok = report.is_ok(),
            "Verification run finished"
        );
        report
    }

    /// Compiles the statements a run would execute, without any connection.
    pub async fn compile_sql(&self, dialect: &dyn SqlDialect) -> CompiledSql {
        let log = DiagnosticsLog::new();
        let contracts = self.load(&log).await;
        let (_, resolver) = self.build(contracts, &log);

        let mut statements = Vec::new();
        for group in plan_groups(resolver.metrics()) {
            for statement in group.statements(dialect) {
                statements.push(CompiledStatement {
                    data_source: group.data_source.clone(),
                    dataset: group.dataset.to_string(),
                    sql: statement.sql,
                });
            }
        }

        CompiledSql {
            statements,
            diagnostics: log.sorted(),
        }
    }

    async fn load(&self, log: &DiagnosticsLog) -> Vec<Contract> {
        let mut contracts = Vec::new();
        for source in &self.sources {
            match self.load_contract(source, log).await {
                Ok(Some(contract)) => contracts.push(contract),
                Ok(None) => {}
                Err(err) => log.error(err.to_string(), err.location()),
            }
        }
        contracts
    }

    /// `Ok(None)` when the document could not be parsed and the parser has
    /// already recorded why.
    async fn load_contract(
        &self,
        source: &ContractSource,
        log: &DiagnosticsLog,
    ) -> Result<Option<Contract>, VerificationError> {
        let (file_id, text): (String, Cow<'_, str>) = match source {
            ContractSource::File(path) => {
                detect_format(path)?;
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| VerificationError::io(path.display().to_string(), source))?;
                (path.display().to_string(), Cow::Owned(text))
            }
            ContractSource::Text { file_id, text } => (file_id.clone(), Cow::Borrowed(text)),
        };
        debug!(file = %file_id, "Parsing contract");

        let errors_before = log.count(Severity::Error);
        let Some(root) = parse_yaml_with_variables(&text, &file_id, &self.context.variables, log)
        else {
            if log.count(Severity::Error) > errors_before {
                return Ok(None);
            }
            return Err(ContractError::EmptyDocument(file_id).into());
        };

        Ok(Some(Contract::parse(&root, &self.registry, log)?))
    }

    fn build(
        &self,
        contracts: Vec<Contract>,
        log: &DiagnosticsLog,
    ) -> (Vec<PlannedContract>, MetricResolver) {
        let now = self.context.now();
        let mut resolver = MetricResolver::new(log.clone());

        let planned = contracts
            .into_iter()
            .map(|contract| {
                let data_source = self.data_source_name(&contract);
                let mut ctx = BuildContext {
                    data_source: &data_source,
                    dataset: &contract.dataset,
                    columns: &contract.columns,
                    now,
                    resolver: &mut resolver,
                };
                let checks = contract
                    .checks
                    .iter()
                    .map(|definition| definition.build(&mut ctx))
                    .collect();
                PlannedContract {
                    contract,
                    data_source,
                    checks,
                }
            })
            .collect();

        (planned, resolver)
    }

    /// The contract's data source, the context default, or the only one
    /// registered. Empty when none applies.
    fn data_source_name(&self, contract: &Contract) -> String {
        contract
            .data_source
            .clone()
            .or_else(|| self.context.default_data_source.clone())
            .or_else(|| match self.data_sources.as_slice() {
                [only] => Some(only.name.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn data_source(&self, name: &str) -> Option<&DataSource> {
        self.data_sources
            .iter()
            .find(|data_source| data_source.name == name)
    }

    fn check_data_source(&self, planned: &PlannedContract) -> Result<(), VerificationError> {
        let contract = &planned.contract;
        if planned.data_source.is_empty() {
            return Err(VerificationError::NoDataSource {
                dataset: contract.dataset.to_string(),
                location: Some(contract.location.clone()),
            });
        }
        if self.data_source(&planned.data_source).is_none() {
            let location = contract
                .data_source_location
                .as_ref()
                .unwrap_or(&contract.location);
            return Err(VerificationError::unknown_data_source(
                planned.data_source.as_str(),
                Some(location),
            ));
        }
        Ok(())
    }

    /// Runs every group and returns the executed SQL in group order.
    async fn execute_groups(&self, groups: Vec<MetricGroup>) -> Vec<String> {
        let tasks = groups.into_iter().enumerate().map(|(index, group)| {
            let data_source = self.data_source(&group.data_source).cloned();
            async move { (index, execute_group(group, data_source).await) }
        });

        let mut executed: Vec<(usize, Vec<String>)> = futures::stream::iter(tasks)
            .buffer_unordered(self.context.max_concurrency.max(1))
            .collect()
            .await;
        executed.sort_by_key(|(index, _)| *index);
        executed.into_iter().flat_map(|(_, sql)| sql).collect()
    }
}

/// Metrics of one (data source, dataset) pair.
struct MetricGroup {
    data_source: String,
    dataset: TableRef,
    /// Aggregations per distinct filter, in registration order
    batches: Vec<(Option<String>, Vec<(Arc<Metric>, SqlExpr)>)>,
    schema: Option<Arc<Metric>>,
}

enum StatementTarget {
    /// Result columns map onto these metrics by position
    Aggregations(Vec<Arc<Metric>>),
    Schema(Arc<Metric>),
}

struct PlannedStatement {
    sql: String,
    target: StatementTarget,
}

impl MetricGroup {
    fn new(data_source: &str, dataset: &TableRef) -> Self {
        Self {
            data_source: data_source.to_string(),
            dataset: dataset.clone(),
            batches: Vec::new(),
            schema: None,
        }
    }

    fn metrics(&self) -> impl Iterator<Item = &Arc<Metric>> {
        self.batches
            .iter()
            .flat_map(|(_, metrics)| metrics.iter().map(|(metric, _)| metric))
            .chain(self.schema.iter())
    }

    fn statements(&self, dialect: &dyn SqlDialect) -> Vec<PlannedStatement> {
        let from = FromClause::new(self.dataset.table.as_str())
            .within(dialect.table_qualifiers(&self.dataset));

        let mut statements: Vec<PlannedStatement> = self
            .batches
            .iter()
            .map(|(filter, metrics)| {
                let mut clauses = vec![
                    SqlClause::Select(metrics.iter().map(|(_, expr)| expr.clone()).collect()),
                    SqlClause::From(from.clone()),
                ];
                if let Some(filter) = filter {
                    clauses.push(SqlClause::Where(SqlExpr::raw(filter.as_str())));
                }
                PlannedStatement {
                    sql: dialect.build_select_sql(&clauses),
                    target: StatementTarget::Aggregations(
                        metrics.iter().map(|(metric, _)| Arc::clone(metric)).collect(),
                    ),
                }
            })
            .collect();

        if let Some(schema) = &self.schema {
            statements.push(PlannedStatement {
                sql: MetadataColumnsQuery::new(dialect).build_sql(&self.dataset),
                target: StatementTarget::Schema(Arc::clone(schema)),
            });
        }
        statements
    }
}

/// Groups canonical metrics by (data source, dataset), then by filter.
fn plan_groups(metrics: &[Arc<Metric>]) -> Vec<MetricGroup> {
    let mut groups: Vec<MetricGroup> = Vec::new();
    let mut positions: HashMap<(String, TableRef), usize> = HashMap::new();

    for metric in metrics {
        let (data_source, dataset) = match metric.kind() {
            MetricKind::Aggregation(aggregation) => (&aggregation.data_source, &aggregation.dataset),
            MetricKind::Schema(schema) => (&schema.data_source, &schema.dataset),
            MetricKind::Derived(_) => continue,
        };
        let position = *positions
            .entry((data_source.clone(), dataset.clone()))
            .or_insert_with(|| {
                groups.push(MetricGroup::new(data_source, dataset));
                groups.len() - 1
            });
        let group = &mut groups[position];

        match metric.kind() {
            MetricKind::Aggregation(aggregation) => {
                let entry = (Arc::clone(metric), aggregation.sql_expression());
                match group
                    .batches
                    .iter_mut()
                    .find(|(filter, _)| *filter == aggregation.filter)
                {
                    Some((_, batch)) => batch.push(entry),
                    None => group.batches.push((aggregation.filter.clone(), vec![entry])),
                }
            }
            MetricKind::Schema(_) => group.schema = Some(Arc::clone(metric)),
            MetricKind::Derived(_) => {}
        }
    }

    groups
}

/// Executes a group's statements and fills its metrics.
///
/// Values are only stored once every statement succeeded; on the first
/// failure all metrics of the group get the error instead.
async fn execute_group(group: MetricGroup, data_source: Option<DataSource>) -> Vec<String> {
    let Some(data_source) = data_source else {
        let message = if group.data_source.is_empty() {
            "No data source configured".to_string()
        } else {
            format!("Unknown data source '{}'", group.data_source)
        };
        for metric in group.metrics() {
            metric.set_error(message.as_str());
        }
        return Vec::new();
    };

    let dialect = data_source.dialect.as_ref();
    let statements = group.statements(dialect);
    let mut executed = Vec::with_capacity(statements.len());
    let mut results: Vec<QueryResult> = Vec::with_capacity(statements.len());

    for statement in &statements {
        debug!(
            data_source = %group.data_source,
            dataset = %group.dataset,
            sql = %statement.sql,
            "Executing query"
        );
        executed.push(statement.sql.clone());
        match data_source.connection.execute_query(&statement.sql).await {
            Ok(result) => results.push(result),
            Err(err) => {
                error!(
                    data_source = %group.data_source,
                    dataset = %group.dataset,
                    error = %err,
                    "Query failed, dataset group is not evaluated"
                );
                let message = err.to_string();
                for metric in group.metrics() {
                    metric.set_error(message.as_str());
                }
                return executed;
            }
        }
    }

    for (statement, result) in statements.iter().zip(&results) {
        match &statement.target {
            StatementTarget::Aggregations(metrics) => {
                let row = result.first_row().unwrap_or_default();
                for (position, metric) in metrics.iter().enumerate() {
                    match row.get(position) {
                        Some(value) => metric.set_value(value.clone()),
                        None => metric.set_error("Query returned no value"),
                    }
                }
            }
            StatementTarget::Schema(metric) => {
                let rows = result.rows.iter().filter_map(|row| match row.as_slice() {
                    [name, data_type, ..] => Some((name.to_string(), data_type.to_string())),
                    _ => None,
                });
                metric.set_columns(MetadataColumnsQuery::new(dialect).get_result(rows));
            }
        }
    }
    executed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregationMeasure, ScalarValue};
    use contracts_sql::AnsiDialect;
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
    }

    fn count(data_source: &str, table: &str, filter: Option<&str>) -> Arc<Metric> {
        Arc::new(Metric::aggregation(
            data_source,
            TableRef::new(table),
            None,
            filter.map(str::to_string),
            Box::new(CountStar),
        ))
    }

    #[test]
    fn test_groups_by_dataset_then_filter() {
        let metrics = vec![
            count("warehouse", "orders", None),
            count("warehouse", "customers", None),
            count("warehouse", "orders", Some("status = 'open'")),
            Arc::new(Metric::schema("warehouse", TableRef::new("orders"))),
        ];
        let groups = plan_groups(&metrics);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].dataset, TableRef::new("orders"));
        assert_eq!(groups[0].batches.len(), 2);
        assert!(groups[0].schema.is_some());

        let statements = groups[0].statements(&AnsiDialect);
        let sql: Vec<&str> = statements.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                "SELECT COUNT(*)\nFROM \"orders\";",
                "SELECT COUNT(*)\nFROM \"orders\"\nWHERE (status = 'open');",
                "SELECT \"column_name\",\n       \"data_type\"\nFROM \"information_schema\".\"columns\"\nWHERE \"table_name\" = 'orders';",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_data_source_fails_group_metrics() {
        let metric = count("nowhere", "orders", None);
        let group = plan_groups(std::slice::from_ref(&metric)).remove(0);

        let executed = execute_group(group, None).await;
        assert!(executed.is_empty());
        assert_eq!(metric.error(), Some("Unknown data source 'nowhere'"));
        assert_eq!(metric.scalar(), None::<&ScalarValue>);
    }
}
