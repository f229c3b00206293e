//! Per-backend SQL rendering.
//!
//! [`SqlDialect`] supplies default ANSI behavior for every rendering decision;
//! backends override only the conventions that differ.

use crate::{FromClause, Literal, SqlClause, SqlExpr, TableRef};
use std::fmt;
use std::sync::Arc;

/// Backend-specific rules for turning the neutral AST into SQL text.
pub trait SqlDialect: fmt::Debug + Send + Sync {
    /// Backend type name, e.g. `postgres`.
    fn name(&self) -> &'static str;

    /// Character that opens and closes a quoted identifier.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Case folding applied to identifiers and metadata name literals.
    fn fold_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.quote_char();
        let folded = self.fold_identifier(name);
        let escaped = folded.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Whether table names may carry a database qualifier.
    fn supports_database_qualifier(&self) -> bool {
        true
    }

    /// Qualifier path of a dataset, outermost first.
    fn table_qualifiers(&self, table: &TableRef) -> Vec<String> {
        let database = table
            .database
            .as_ref()
            .filter(|_| self.supports_database_qualifier());
        database
            .into_iter()
            .chain(table.schema.as_ref())
            .cloned()
            .collect()
    }

    /// Fully qualified, quoted table name.
    fn qualify_table(&self, table: &TableRef) -> String {
        self.render_from(&FromClause::new(&table.table).within(self.table_qualifiers(table)))
    }

    fn null_keyword(&self) -> &'static str {
        "NULL"
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn render_literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Null => self.null_keyword().to_string(),
            Literal::Boolean(true) => "TRUE".to_string(),
            Literal::Boolean(false) => "FALSE".to_string(),
            Literal::Integer(value) => value.to_string(),
            Literal::Float(value) => value.to_string(),
            Literal::String(value) => format!("'{}'", self.escape_string(value)),
        }
    }

    /// Regular expression match of `expr` against the rendered `pattern`.
    fn regex_like(&self, expr: &str, pattern: &str) -> String {
        format!("REGEXP_LIKE({}, {})", expr, pattern)
    }

    fn render_expression(&self, expr: &SqlExpr) -> String {
        match expr {
            SqlExpr::Column(name) => self.quote_identifier(name),
            SqlExpr::Literal(literal) => self.render_literal(literal),
            SqlExpr::Star => "*".to_string(),
            SqlExpr::Raw(sql) => format!("({})", sql),
            SqlExpr::And(operands) => self.render_junction(operands, "AND"),
            SqlExpr::Or(operands) => self.render_junction(operands, "OR"),
            SqlExpr::Not(inner) => format!("NOT ({})", self.render_expression(inner)),
            SqlExpr::Compare { left, op, right } => format!(
                "{} {} {}",
                self.render_expression(left),
                op.symbol(),
                self.render_expression(right)
            ),
            SqlExpr::In { expr, values } => {
                let values: Vec<String> =
                    values.iter().map(|v| self.render_expression(v)).collect();
                format!("{} IN ({})", self.render_expression(expr), values.join(", "))
            }
            SqlExpr::IsNull(inner) => format!("{} IS NULL", self.render_expression(inner)),
            SqlExpr::RegexLike { expr, pattern } => self.regex_like(
                &self.render_expression(expr),
                &self.render_literal(&Literal::String(pattern.clone())),
            ),
            SqlExpr::CaseWhen {
                condition,
                then,
                otherwise,
            } => format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                self.render_expression(condition),
                self.render_expression(then),
                self.render_expression(otherwise)
            ),
            SqlExpr::Sum(inner) => format!("SUM({})", self.render_expression(inner)),
            SqlExpr::Count(inner) => format!("COUNT({})", self.render_expression(inner)),
            SqlExpr::CountDistinct(inner) => {
                format!("COUNT(DISTINCT {})", self.render_expression(inner))
            }
            SqlExpr::Avg(inner) => format!("AVG({})", self.render_expression(inner)),
            SqlExpr::Min(inner) => format!("MIN({})", self.render_expression(inner)),
            SqlExpr::Max(inner) => format!("MAX({})", self.render_expression(inner)),
            SqlExpr::Minus(left, right) => format!(
                "{} - {}",
                self.render_expression(left),
                self.render_expression(right)
            ),
        }
    }

    /// Joins operands with `keyword`, parenthesizing nested junctions.
    fn render_junction(&self, operands: &[SqlExpr], keyword: &str) -> String {
        let rendered: Vec<String> = operands
            .iter()
            .map(|operand| match operand {
                SqlExpr::And(_) | SqlExpr::Or(_) => {
                    format!("({})", self.render_expression(operand))
                }
                _ => self.render_expression(operand),
            })
            .collect();
        rendered.join(&format!(" {} ", keyword))
    }

    fn render_from(&self, from: &FromClause) -> String {
        from.qualifiers
            .iter()
            .chain(std::iter::once(&from.table))
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Renders exactly one `SELECT ... FROM ... WHERE ...;` statement.
    ///
    /// Clause order in the output is fixed. Multiple `Select` clauses append
    /// their columns, multiple `Where` clauses are combined with `AND`.
    fn build_select_sql(&self, clauses: &[SqlClause]) -> String {
        let mut columns: Vec<String> = Vec::new();
        let mut from: Option<String> = None;
        let mut predicates: Vec<&SqlExpr> = Vec::new();

        for clause in clauses {
            match clause {
                SqlClause::Select(exprs) => {
                    columns.extend(exprs.iter().map(|e| self.render_expression(e)))
                }
                SqlClause::From(target) => from = Some(self.render_from(target)),
                SqlClause::Where(predicate) => predicates.push(predicate),
            }
        }

        let mut sql = format!("SELECT {}", columns.join(",\n       "));
        if let Some(from) = from {
            sql.push_str("\nFROM ");
            sql.push_str(&from);
        }
        match predicates.as_slice() {
            [] => {}
            [single] => {
                sql.push_str("\nWHERE ");
                sql.push_str(&self.render_expression(single));
            }
            many => {
                let combined = SqlExpr::And(many.iter().map(|p| (*p).clone()).collect());
                sql.push_str("\nWHERE ");
                sql.push_str(&self.render_expression(&combined));
            }
        }
        sql.push(';');
        sql
    }

    /// `DROP TABLE` for an already qualified and quoted name.
    fn drop_table_statement(&self, qualified_table: &str) -> String {
        format!("DROP TABLE {};", qualified_table)
    }

    /// Name of the schema that holds the metadata views.
    fn information_schema_name(&self) -> String {
        "information_schema".to_string()
    }

    /// Qualifier path of the metadata views for a dataset.
    fn information_schema_qualifiers(&self, table: &TableRef) -> Vec<String> {
        let database = table
            .database
            .as_ref()
            .filter(|_| self.supports_database_qualifier());
        database
            .cloned()
            .into_iter()
            .chain(std::iter::once(self.information_schema_name()))
            .collect()
    }

    /// Metadata view listing table columns.
    fn columns_table_name(&self) -> String {
        "columns".to_string()
    }

    fn table_catalog_column(&self) -> String {
        "table_catalog".to_string()
    }

    fn table_schema_column(&self) -> String {
        "table_schema".to_string()
    }

    fn table_name_column(&self) -> String {
        "table_name".to_string()
    }

    fn column_name_column(&self) -> String {
        "column_name".to_string()
    }

    fn data_type_column(&self) -> String {
        "data_type".to_string()
    }
}

/// Generic ANSI SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl SqlDialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn regex_like(&self, expr: &str, pattern: &str) -> String {
        format!("{} ~ {}", expr, pattern)
    }
}

/// Snowflake stores unquoted identifiers upper-case, including metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeDialect;

impl SqlDialect for SnowflakeDialect {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn fold_identifier(&self, name: &str) -> String {
        name.to_uppercase()
    }

    fn information_schema_name(&self) -> String {
        "INFORMATION_SCHEMA".to_string()
    }

    fn columns_table_name(&self) -> String {
        "COLUMNS".to_string()
    }

    fn table_catalog_column(&self) -> String {
        "TABLE_CATALOG".to_string()
    }

    fn table_schema_column(&self) -> String {
        "TABLE_SCHEMA".to_string()
    }

    fn table_name_column(&self) -> String {
        "TABLE_NAME".to_string()
    }

    fn column_name_column(&self) -> String {
        "COLUMN_NAME".to_string()
    }

    fn data_type_column(&self) -> String {
        "DATA_TYPE".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BigQueryDialect;

impl SqlDialect for BigQueryDialect {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    fn regex_like(&self, expr: &str, pattern: &str) -> String {
        format!("REGEXP_CONTAINS({}, {})", expr, pattern)
    }

    // INFORMATION_SCHEMA views are scoped to a dataset: project.dataset.INFORMATION_SCHEMA
    fn information_schema_qualifiers(&self, table: &TableRef) -> Vec<String> {
        self.table_qualifiers(table)
            .into_iter()
            .chain(std::iter::once(self.information_schema_name()))
            .collect()
    }

    fn information_schema_name(&self) -> String {
        "INFORMATION_SCHEMA".to_string()
    }

    fn columns_table_name(&self) -> String {
        "COLUMNS".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn supports_database_qualifier(&self) -> bool {
        false
    }
}

/// Apache DataFusion, the embedded engine behind the bundled connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFusionDialect;

impl SqlDialect for DataFusionDialect {
    fn name(&self) -> &'static str {
        "datafusion"
    }

    fn regex_like(&self, expr: &str, pattern: &str) -> String {
        format!("{} ~ {}", expr, pattern)
    }
}

/// Looks up a dialect by backend type name (case-insensitive).
pub fn dialect_for(name: &str) -> Option<Arc<dyn SqlDialect>> {
    let dialect: Arc<dyn SqlDialect> = match name.to_lowercase().as_str() {
        "ansi" | "generic" => Arc::new(AnsiDialect),
        "postgres" | "postgresql" => Arc::new(PostgresDialect),
        "snowflake" => Arc::new(SnowflakeDialect),
        "bigquery" => Arc::new(BigQueryDialect),
        "mysql" => Arc::new(MySqlDialect),
        "datafusion" => Arc::new(DataFusionDialect),
        _ => return None,
    };
    Some(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn missing_count(column: &str) -> SqlExpr {
        SqlExpr::count_if(SqlExpr::or(vec![
            SqlExpr::is_null(SqlExpr::column(column)),
            SqlExpr::in_list(
                SqlExpr::column(column),
                vec![SqlExpr::literal("N/A"), SqlExpr::literal("-")],
            ),
        ]))
    }

    #[test]
    fn test_ansi_missing_count_expression() {
        assert_eq!(
            AnsiDialect.render_expression(&missing_count("customer_id")),
            r#"SUM(CASE WHEN "customer_id" IS NULL OR "customer_id" IN ('N/A', '-') THEN 1 ELSE 0 END)"#
        );
    }

    #[test]
    fn test_clause_order_is_fixed() {
        let clauses = vec![
            SqlClause::Where(SqlExpr::raw("status = 'open'")),
            SqlClause::Select(vec![SqlExpr::count(SqlExpr::Star)]),
            SqlClause::From(FromClause::new("orders").within(["shop", "public"])),
        ];
        assert_eq!(
            AnsiDialect.build_select_sql(&clauses),
            "SELECT COUNT(*)\nFROM \"shop\".\"public\".\"orders\"\nWHERE (status = 'open');"
        );
    }

    #[test]
    fn test_multiple_select_and_where_clauses() {
        let clauses = vec![
            SqlClause::Select(vec![SqlExpr::count(SqlExpr::Star)]),
            SqlClause::Select(vec![SqlExpr::max(SqlExpr::column("updated_at"))]),
            SqlClause::From(FromClause::new("orders")),
            SqlClause::Where(SqlExpr::is_null(SqlExpr::column("deleted_at"))),
            SqlClause::Where(SqlExpr::raw("amount > 0")),
        ];
        assert_eq!(
            PostgresDialect.build_select_sql(&clauses),
            "SELECT COUNT(*),\n       MAX(\"updated_at\")\nFROM \"orders\"\nWHERE \"deleted_at\" IS NULL AND (amount > 0);"
        );
    }

    #[test]
    fn test_nested_junctions_are_parenthesized() {
        let expr = SqlExpr::and(vec![
            SqlExpr::not(SqlExpr::is_null(SqlExpr::column("a"))),
            SqlExpr::or(vec![
                SqlExpr::eq(SqlExpr::column("b"), SqlExpr::literal(1)),
                SqlExpr::compare(SqlExpr::column("b"), crate::CompareOp::Gt, SqlExpr::literal(5.5)),
            ]),
        ]);
        assert_eq!(
            AnsiDialect.render_expression(&expr),
            r#"NOT ("a" IS NULL) AND ("b" = 1 OR "b" > 5.5)"#
        );
    }

    #[test]
    fn test_qualify_table_per_dialect() {
        let table = TableRef::new("orders")
            .with_schema("sales")
            .with_database("shop");
        assert_eq!(AnsiDialect.qualify_table(&table), r#""shop"."sales"."orders""#);
        assert_eq!(SnowflakeDialect.qualify_table(&table), r#""SHOP"."SALES"."ORDERS""#);
        assert_eq!(BigQueryDialect.qualify_table(&table), "`shop`.`sales`.`orders`");
        assert_eq!(MySqlDialect.qualify_table(&table), "`sales`.`orders`");
        assert_eq!(
            DataFusionDialect.qualify_table(&TableRef::new("orders")),
            r#""orders""#
        );
    }

    #[test]
    fn test_literal_escaping() {
        let literal = Literal::String("O'Brien\\".to_string());
        assert_eq!(AnsiDialect.render_literal(&literal), r"'O''Brien\'");
        assert_eq!(BigQueryDialect.render_literal(&literal), r"'O\'Brien\\'");
        assert_eq!(AnsiDialect.render_literal(&Literal::Null), "NULL");
        assert_eq!(AnsiDialect.render_literal(&Literal::Boolean(true)), "TRUE");
    }

    #[test]
    fn test_regex_rendering() {
        let expr = SqlExpr::regex_like(SqlExpr::column("email"), "^.+@.+$");
        assert_eq!(
            PostgresDialect.render_expression(&expr),
            r#""email" ~ '^.+@.+$'"#
        );
        assert_eq!(
            AnsiDialect.render_expression(&expr),
            r#"REGEXP_LIKE("email", '^.+@.+$')"#
        );
        assert_eq!(
            BigQueryDialect.render_expression(&expr),
            "REGEXP_CONTAINS(`email`, '^.+@.+$')"
        );
    }

    #[test]
    fn test_quote_identifier_escapes_quote_char() {
        assert_eq!(AnsiDialect.quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for("PostgreSQL").map(|d| d.name()), Some("postgres"));
        assert_eq!(dialect_for("datafusion").map(|d| d.name()), Some("datafusion"));
        assert!(dialect_for("oracle").is_none());
    }
}
