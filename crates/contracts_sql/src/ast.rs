//! Dialect-neutral SQL expression and clause tree.
//!
//! Nothing in here knows how identifiers are quoted or how literals are
//! escaped; that is the job of a [`crate::SqlDialect`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A table, optionally qualified by database and schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            table: table.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.database, &self.schema].into_iter().flatten() {
            write!(f, "{}.", part)?;
        }
        write!(f, "{}", self.table)
    }
}

/// Scalar literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// SQL expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// Column reference, quoted by the dialect
    Column(String),
    Literal(Literal),
    /// `*`
    Star,
    /// User supplied SQL, rendered verbatim inside parentheses
    Raw(String),
    And(Vec<SqlExpr>),
    Or(Vec<SqlExpr>),
    Not(Box<SqlExpr>),
    Compare {
        left: Box<SqlExpr>,
        op: CompareOp,
        right: Box<SqlExpr>,
    },
    In {
        expr: Box<SqlExpr>,
        values: Vec<SqlExpr>,
    },
    IsNull(Box<SqlExpr>),
    RegexLike {
        expr: Box<SqlExpr>,
        pattern: String,
    },
    CaseWhen {
        condition: Box<SqlExpr>,
        then: Box<SqlExpr>,
        otherwise: Box<SqlExpr>,
    },
    Sum(Box<SqlExpr>),
    Count(Box<SqlExpr>),
    CountDistinct(Box<SqlExpr>),
    Avg(Box<SqlExpr>),
    Min(Box<SqlExpr>),
    Max(Box<SqlExpr>),
    Minus(Box<SqlExpr>, Box<SqlExpr>),
}

impl SqlExpr {
    pub fn column(name: impl Into<String>) -> Self {
        SqlExpr::Column(name.into())
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        SqlExpr::Literal(value.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        SqlExpr::Raw(sql.into())
    }

    pub fn and(operands: Vec<SqlExpr>) -> Self {
        SqlExpr::And(operands)
    }

    pub fn or(operands: Vec<SqlExpr>) -> Self {
        SqlExpr::Or(operands)
    }

    pub fn not(expr: SqlExpr) -> Self {
        SqlExpr::Not(Box::new(expr))
    }

    pub fn compare(left: SqlExpr, op: CompareOp, right: SqlExpr) -> Self {
        SqlExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: SqlExpr, right: SqlExpr) -> Self {
        Self::compare(left, CompareOp::Eq, right)
    }

    pub fn in_list(expr: SqlExpr, values: Vec<SqlExpr>) -> Self {
        SqlExpr::In {
            expr: Box::new(expr),
            values,
        }
    }

    pub fn is_null(expr: SqlExpr) -> Self {
        SqlExpr::IsNull(Box::new(expr))
    }

    pub fn regex_like(expr: SqlExpr, pattern: impl Into<String>) -> Self {
        SqlExpr::RegexLike {
            expr: Box::new(expr),
            pattern: pattern.into(),
        }
    }

    pub fn case_when(condition: SqlExpr, then: SqlExpr, otherwise: SqlExpr) -> Self {
        SqlExpr::CaseWhen {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn sum(expr: SqlExpr) -> Self {
        SqlExpr::Sum(Box::new(expr))
    }

    pub fn count(expr: SqlExpr) -> Self {
        SqlExpr::Count(Box::new(expr))
    }

    pub fn count_distinct(expr: SqlExpr) -> Self {
        SqlExpr::CountDistinct(Box::new(expr))
    }

    pub fn avg(expr: SqlExpr) -> Self {
        SqlExpr::Avg(Box::new(expr))
    }

    pub fn min(expr: SqlExpr) -> Self {
        SqlExpr::Min(Box::new(expr))
    }

    pub fn max(expr: SqlExpr) -> Self {
        SqlExpr::Max(Box::new(expr))
    }

    pub fn minus(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Minus(Box::new(left), Box::new(right))
    }

    /// `SUM(CASE WHEN condition THEN 1 ELSE 0 END)`
    pub fn count_if(condition: SqlExpr) -> Self {
        Self::sum(Self::case_when(
            condition,
            Self::literal(1),
            Self::literal(0),
        ))
    }
}

/// `FROM` target: a table name under an optional qualifier path.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: String,
    pub qualifiers: Vec<String>,
}

impl FromClause {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            qualifiers: Vec::new(),
        }
    }

    /// Places the table under `qualifiers`, outermost first.
    pub fn within<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }
}

/// One clause of a `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlClause {
    Select(Vec<SqlExpr>),
    From(FromClause),
    Where(SqlExpr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_display() {
        assert_eq!(TableRef::new("orders").to_string(), "orders");
        assert_eq!(
            TableRef::new("orders")
                .with_schema("public")
                .with_database("shop")
                .to_string(),
            "shop.public.orders"
        );
    }

    #[test]
    fn test_count_if_shape() {
        let expr = SqlExpr::count_if(SqlExpr::is_null(SqlExpr::column("id")));
        assert!(matches!(expr, SqlExpr::Sum(inner) if matches!(*inner, SqlExpr::CaseWhen { .. })));
    }
}
