//! # Contracts Validator
//!
//! Turns parsed contracts into checks, the checks into deduplicated metrics,
//! and the metrics into SQL executed through a [`DataSourceConnection`]:
//!
//! - [`Contract`]: the dataset, declared columns and checks of one document
//! - [`checks`]: the check-type framework and the built-in check types
//! - [`MetricResolver`]: one canonical metric per structural [`MetricKey`]
//! - [`ContractVerification`]: the orchestrator producing a [`VerificationReport`]
//! - [`DataFusionConnection`]: an in-process backend for CSV, Parquet and Arrow data
//!
//! ## Example
//!
//! ```rust
//! use contracts_validator::{CheckTypeRegistry, Contract};
//!
//! let yaml = "dataset: orders\nchecks:\n  - type: row_count\n";
//! let (root, log) = contracts_parser::parse(yaml, "orders.yml");
//! let contract = Contract::parse(&root.unwrap(), &CheckTypeRegistry::with_defaults(), &log).unwrap();
//!
//! assert_eq!(contract.checks.len(), 1);
//! assert!(log.is_empty());
//! ```

pub mod checks;
mod connection;
mod contract;
mod datafusion_connection;
mod engine;
mod error;
mod metrics;
mod resolver;
mod result;

pub use checks::{
    BuildContext, Check, CheckDefinition, CheckHeader, CheckNode, CheckType, CheckTypeRegistry,
};
pub use connection::*;
pub use contract::*;
pub use datafusion_connection::*;
pub use engine::*;
pub use error::*;
pub use metrics::*;
pub use resolver::*;
pub use result::*;
