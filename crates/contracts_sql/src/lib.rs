//! # Contracts SQL
//!
//! A small SQL algebra used to compile contract metrics into queries. Statements
//! are assembled from [`SqlClause`]s and [`SqlExpr`] nodes without reference to
//! any backend; a [`SqlDialect`] renders them for a specific one.
//!
//! ## Example
//!
//! ```rust
//! use contracts_sql::{AnsiDialect, FromClause, SqlClause, SqlDialect, SqlExpr};
//!
//! let sql = AnsiDialect.build_select_sql(&[
//!     SqlClause::Select(vec![SqlExpr::count(SqlExpr::Star)]),
//!     SqlClause::From(FromClause::new("orders")),
//! ]);
//! assert_eq!(sql, "SELECT COUNT(*)\nFROM \"orders\";");
//! ```

pub mod ast;
pub mod dialect;
pub mod statements;

pub use ast::*;
pub use dialect::*;
pub use statements::*;
