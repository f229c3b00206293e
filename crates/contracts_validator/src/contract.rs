//! Contract model: one dataset, its declared columns and its checks.

use crate::checks::{CheckDefinition, CheckHeader, CheckNode, CheckTypeRegistry};
use contracts_core::{
    ContractError, DiagnosticsLog, Number, Result, SourceLocation, Value, YamlList, YamlObject,
};
use contracts_sql::{Literal, SqlExpr, TableRef};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

pub const CHECK_TYPES_DOCS: &str = "contract-format.md#check-types";
pub const COLUMNS_DOCS: &str = "contract-format.md#columns";

/// Which values of a column count as missing, besides NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_values: Option<Vec<Literal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_regex: Option<String>,
}

impl MissingConfiguration {
    /// Reads `missing_values` and `missing_regex` from a column or check node.
    pub fn parse(node: &YamlObject, log: &DiagnosticsLog) -> Self {
        Self {
            missing_values: read_literals(node, "missing_values", log),
            missing_regex: read_regex(node, "missing_regex", log),
        }
    }

    /// Settings present in `overrides` replace ours.
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            missing_values: overrides
                .missing_values
                .clone()
                .or_else(|| self.missing_values.clone()),
            missing_regex: overrides
                .missing_regex
                .clone()
                .or_else(|| self.missing_regex.clone()),
        }
    }

    /// Predicate true for rows in which `column` is missing.
    pub fn is_missing_expr(&self, column: &str) -> SqlExpr {
        let mut conditions = vec![SqlExpr::is_null(SqlExpr::column(column))];
        if let Some(values) = self.missing_values.as_ref().filter(|values| !values.is_empty()) {
            conditions.push(SqlExpr::in_list(
                SqlExpr::column(column),
                values.iter().cloned().map(SqlExpr::Literal).collect(),
            ));
        }
        if let Some(pattern) = &self.missing_regex {
            conditions.push(SqlExpr::regex_like(SqlExpr::column(column), pattern.as_str()));
        }
        junction(conditions, SqlExpr::or).unwrap_or_else(|| SqlExpr::is_null(SqlExpr::column(column)))
    }
}

/// Which values of a column are valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidityConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<Literal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_max: Option<f64>,
}

impl ValidityConfiguration {
    pub fn parse(node: &YamlObject, log: &DiagnosticsLog) -> Self {
        Self {
            valid_values: read_literals(node, "valid_values", log),
            valid_regex: read_regex(node, "valid_regex", log),
            valid_min: read_finite(node, "valid_min", log),
            valid_max: read_finite(node, "valid_max", log),
        }
    }

    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            valid_values: overrides
                .valid_values
                .clone()
                .or_else(|| self.valid_values.clone()),
            valid_regex: overrides
                .valid_regex
                .clone()
                .or_else(|| self.valid_regex.clone()),
            valid_min: overrides.valid_min.or(self.valid_min),
            valid_max: overrides.valid_max.or(self.valid_max),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.valid_values.is_some()
            || self.valid_regex.is_some()
            || self.valid_min.is_some()
            || self.valid_max.is_some()
    }

    /// Predicate true for rows in which `column` is valid, `None` when nothing
    /// is configured.
    pub fn is_valid_expr(&self, column: &str) -> Option<SqlExpr> {
        let mut conditions = Vec::new();
        match &self.valid_values {
            // Nothing is valid
            Some(values) if values.is_empty() => {
                conditions.push(SqlExpr::Literal(Literal::Boolean(false)))
            }
            Some(values) => conditions.push(SqlExpr::in_list(
                SqlExpr::column(column),
                values.iter().cloned().map(SqlExpr::Literal).collect(),
            )),
            None => {}
        }
        if let Some(pattern) = &self.valid_regex {
            conditions.push(SqlExpr::regex_like(SqlExpr::column(column), pattern.as_str()));
        }
        if let Some(min) = self.valid_min {
            conditions.push(SqlExpr::compare(
                SqlExpr::column(column),
                contracts_sql::CompareOp::GtEq,
                number_literal(min),
            ));
        }
        if let Some(max) = self.valid_max {
            conditions.push(SqlExpr::compare(
                SqlExpr::column(column),
                contracts_sql::CompareOp::LtEq,
                number_literal(max),
            ));
        }
        junction(conditions, SqlExpr::and)
    }
}

/// Integral bounds render without a fractional part.
fn number_literal(value: f64) -> SqlExpr {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        SqlExpr::literal(value as i64)
    } else {
        SqlExpr::literal(value)
    }
}

fn junction(mut conditions: Vec<SqlExpr>, combine: fn(Vec<SqlExpr>) -> SqlExpr) -> Option<SqlExpr> {
    match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(combine(conditions)),
    }
}

/// `Some` whenever the key is present, so an empty list can clear inherited values.
fn read_literals(node: &YamlObject, key: &str, log: &DiagnosticsLog) -> Option<Vec<Literal>> {
    let list = node.read_list_opt(key, log)?;
    let literals: Vec<Literal> = list
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(Literal::String(s.value.clone())),
            Value::Number(n) => match n.value {
                Number::Integer(i) => Some(Literal::Integer(i)),
                Number::Float(f) if f.is_finite() => Some(Literal::Float(f)),
                Number::Float(_) => {
                    log.error(
                        format!("'{}' items must be finite numbers, but found {}", key, n.value),
                        Some(&n.location),
                    );
                    None
                }
            },
            Value::Boolean(b) => Some(Literal::Boolean(b.value)),
            other => {
                log.error(
                    format!(
                        "'{}' items must be strings or numbers, but found {}",
                        key,
                        other.value_type().with_article()
                    ),
                    Some(other.location()),
                );
                None
            }
        })
        .collect();
    Some(literals)
}

fn read_finite(node: &YamlObject, key: &str, log: &DiagnosticsLog) -> Option<f64> {
    let number = node.read_number_opt(key, log)?;
    let value = number.value.as_f64();
    if value.is_finite() {
        Some(value)
    } else {
        log.error(
            format!("'{}' must be a finite number, but was {}", key, number.value),
            Some(&number.location),
        );
        None
    }
}

fn read_regex(node: &YamlObject, key: &str, log: &DiagnosticsLog) -> Option<String> {
    let pattern = node.read_string_opt(key, log)?;
    match Regex::new(pattern.as_str()) {
        Ok(_) => Some(pattern.value.clone()),
        Err(err) => {
            log.error(
                format!("Invalid regular expression in '{}': {}", key, err),
                Some(&pattern.location),
            );
            None
        }
    }
}

/// A column declared in the `columns` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub location: SourceLocation,
    /// Expected backend type, compared by the schema check
    pub data_type: Option<String>,
    pub missing: MissingConfiguration,
    pub validity: ValidityConfiguration,
}

impl ColumnDefinition {
    /// Column without any configuration.
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            location,
            data_type: None,
            missing: MissingConfiguration::default(),
            validity: ValidityConfiguration::default(),
        }
    }

    fn parse(node: &YamlObject, log: &DiagnosticsLog) -> Option<Self> {
        let name = node.read_string("name", log)?;
        Some(Self {
            name: name.value.clone(),
            location: name.location.clone(),
            data_type: node
                .read_string_opt("data_type", log)
                .map(|data_type| data_type.value.clone()),
            missing: MissingConfiguration::parse(node, log),
            validity: ValidityConfiguration::parse(node, log),
        })
    }
}

/// A parsed contract.
#[derive(Debug)]
pub struct Contract {
    /// File id of the document
    pub source: String,
    pub location: SourceLocation,
    pub name: Option<String>,
    pub owner_email: Option<String>,
    pub dataset: TableRef,
    pub data_source: Option<String>,
    pub data_source_location: Option<SourceLocation>,
    pub columns: Vec<ColumnDefinition>,
    /// Checks in document order
    pub checks: Vec<Box<dyn CheckDefinition>>,
}

impl Contract {
    /// Builds a contract from a parsed document.
    ///
    /// Problems with individual entries are recorded in `log` and the entry is
    /// skipped. Only a document that does not identify a dataset is an error,
    /// which is returned without being logged.
    pub fn parse(root: &Value, registry: &CheckTypeRegistry, log: &DiagnosticsLog) -> Result<Self> {
        let Some(document) = root.as_object() else {
            return Err(ContractError::NotAnObject {
                actual: root.value_type().with_article().to_string(),
                location: root.location().clone(),
            });
        };

        let dataset = match document.get("dataset") {
            None => return Err(ContractError::missing_dataset(document.location())),
            Some(Value::String(dataset)) if !dataset.value.trim().is_empty() => dataset,
            Some(other) => {
                let actual = match other {
                    Value::String(_) => "an empty string",
                    other => other.value_type().with_article(),
                };
                return Err(ContractError::InvalidDataset {
                    actual: actual.to_string(),
                    location: other.location().clone(),
                });
            }
        };

        let mut table = TableRef::new(dataset.as_str());
        if let Some(schema) = document.read_string_opt("schema", log) {
            table = table.with_schema(schema.as_str());
        }
        if let Some(database) = document.read_string_opt("database", log) {
            table = table.with_database(database.as_str());
        }

        let data_source = document.read_string_opt("data_source", log).map(|ds| {
            ds.validate_id(log);
            ds
        });
        let name = document.read_string_opt("name", log).map(|name| {
            name.validate_name(log);
            name.value.clone()
        });
        let owner_email = document.read_string_opt("owner_email", log).map(|email| {
            email.validate_email(log);
            email.value.clone()
        });

        let (columns, column_nodes) = parse_columns(document, log);

        let mut checks = Vec::new();
        for (column, node) in columns.iter().zip(column_nodes) {
            if let Some(list) = node.read_list_opt("checks", log) {
                parse_checks(list, Some(column), &columns, registry, log, &mut checks);
            }
        }
        if let Some(list) = document.read_list_opt("checks", log) {
            parse_checks(list, None, &columns, registry, log, &mut checks);
        }
        checks.sort_by(|a, b| a.header().location.cmp(&b.header().location));

        debug!(
            dataset = %table,
            columns = columns.len(),
            checks = checks.len(),
            "Parsed contract"
        );

        Ok(Self {
            source: document.location().file.to_string(),
            location: document.location().clone(),
            name,
            owner_email,
            dataset: table,
            data_source: data_source.map(|ds| ds.value.clone()),
            data_source_location: data_source.map(|ds| ds.location.clone()),
            columns,
            checks,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }
}

fn parse_columns<'a>(
    document: &'a YamlObject,
    log: &DiagnosticsLog,
) -> (Vec<ColumnDefinition>, Vec<&'a YamlObject>) {
    let mut columns: Vec<ColumnDefinition> = Vec::new();
    let mut nodes = Vec::new();

    let Some(list) = document.read_list_opt("columns", log) else {
        return (columns, nodes);
    };

    for item in list {
        let Some(node) = item.as_object() else {
            log.error_with_docs(
                format!("Column must be an object, but was {}", item.value_type().with_article()),
                Some(item.location()),
                COLUMNS_DOCS,
            );
            continue;
        };
        let Some(column) = ColumnDefinition::parse(node, log) else {
            continue;
        };
        if columns.iter().any(|existing| existing.name == column.name) {
            log.error_with_docs(
                format!("Duplicate column '{}'", column.name),
                Some(&column.location),
                COLUMNS_DOCS,
            );
            continue;
        }
        columns.push(column);
        nodes.push(node);
    }

    (columns, nodes)
}

fn parse_checks(
    list: &YamlList,
    column: Option<&ColumnDefinition>,
    columns: &[ColumnDefinition],
    registry: &CheckTypeRegistry,
    log: &DiagnosticsLog,
    out: &mut Vec<Box<dyn CheckDefinition>>,
) {
    for item in list {
        let Some(node) = item.as_object() else {
            log.error_with_docs(
                format!("Check must be an object, but was {}", item.value_type().with_article()),
                Some(item.location()),
                CHECK_TYPES_DOCS,
            );
            continue;
        };
        let Some(type_name) = node.read_string("type", log) else {
            continue;
        };
        let Some(check_type) = registry.get(type_name.as_str()) else {
            log.error_with_docs(
                format!("Unknown check type '{}'", type_name.as_str()),
                Some(&type_name.location),
                CHECK_TYPES_DOCS,
            );
            continue;
        };

        let bound = match column {
            Some(column) => Some(column.clone()),
            None => node.read_string_opt("column", log).map(|name| {
                columns
                    .iter()
                    .find(|column| column.name == name.value)
                    .cloned()
                    .unwrap_or_else(|| {
                        log.warning(
                            format!("Column '{}' is not declared in 'columns'", name.as_str()),
                            Some(&name.location),
                        );
                        ColumnDefinition::new(name.as_str(), name.location.clone())
                    })
            }),
        };

        let header = CheckHeader::parse(type_name.as_str(), node, bound, log);
        if let Some(definition) = check_type.parse(&CheckNode { header, object: node }, log) {
            out.push(definition);
        }
    }
}
