//! Standalone statements built from the neutral AST.

use crate::{FromClause, SqlClause, SqlDialect, SqlExpr, TableRef};
use serde::{Deserialize, Serialize};

/// `DROP TABLE` for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    table: TableRef,
}

impl DropTable {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn build_sql(&self, dialect: &dyn SqlDialect) -> String {
        dialect.drop_table_statement(&dialect.qualify_table(&self.table))
    }
}

/// Name and declared type of one column as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub column_name: String,
    pub data_type: String,
}

/// Lists a table's columns from the backend's information schema.
///
/// Every view and column name comes from the dialect, so a backend only
/// overrides the names that differ.
pub struct MetadataColumnsQuery<'a> {
    dialect: &'a dyn SqlDialect,
}

impl<'a> MetadataColumnsQuery<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn build_sql(&self, table: &TableRef) -> String {
        let dialect = self.dialect;
        let name_literal = |name: &str| SqlExpr::literal(dialect.fold_identifier(name));

        let mut conditions = Vec::new();
        if let Some(database) = table
            .database
            .as_deref()
            .filter(|_| dialect.supports_database_qualifier())
        {
            conditions.push(SqlExpr::eq(
                SqlExpr::column(dialect.table_catalog_column()),
                name_literal(database),
            ));
        }
        if let Some(schema) = table.schema.as_deref() {
            conditions.push(SqlExpr::eq(
                SqlExpr::column(dialect.table_schema_column()),
                name_literal(schema),
            ));
        }
        conditions.push(SqlExpr::eq(
            SqlExpr::column(dialect.table_name_column()),
            name_literal(&table.table),
        ));

        dialect.build_select_sql(&[
            SqlClause::Select(vec![
                SqlExpr::column(dialect.column_name_column()),
                SqlExpr::column(dialect.data_type_column()),
            ]),
            SqlClause::From(
                FromClause::new(dialect.columns_table_name())
                    .within(dialect.information_schema_qualifiers(table)),
            ),
            SqlClause::Where(SqlExpr::and(conditions)),
        ])
    }

    /// Maps `(column_name, data_type)` rows onto metadata columns.
    pub fn get_result<I>(&self, rows: I) -> Vec<MetadataColumn>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        rows.into_iter()
            .map(|(column_name, data_type)| MetadataColumn {
                column_name,
                data_type,
            })
            .collect()
    }
}
