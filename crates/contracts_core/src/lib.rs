//! # Data Quality Contracts Core
//!
//! Core data structures shared by the contract parser, the SQL layer and the
//! verification engine.
//!
//! ## Key Concepts
//!
//! - **Value tree**: contract documents parsed into [`Value`] nodes that all carry a [`SourceLocation`]
//! - **Diagnostics**: a run-wide [`DiagnosticsLog`] that collects every problem instead of aborting
//! - **Thresholds**: the pass/fail boundary a check compares its metric value against
//! - **Context**: run settings such as variables and the fallback data source
//!
//! ## Example
//!
//! ```rust
//! use contracts_core::{DiagnosticsLog, Threshold};
//!
//! let log = DiagnosticsLog::new();
//! let threshold = Threshold::must_be(0.0);
//! assert!(threshold.passes(0.0));
//! assert_eq!(threshold.assertion_summary("missing_count"), "missing_count must be 0");
//! assert!(!log.has_errors());
//! ```

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod location;
pub mod threshold;
pub mod value;

pub use context::*;
pub use diagnostics::*;
pub use error::*;
pub use location::*;
pub use threshold::*;
pub use value::*;
