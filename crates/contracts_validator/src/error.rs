//! Error types for verification runs.

use contracts_core::{ContractError, SourceLocation};
use contracts_parser::ParserError;
use thiserror::Error;

/// Errors reported by a [`crate::DataSourceConnection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A query statement failed
    #[error("Query failed: {message}")]
    Query { sql: String, message: String },

    /// An update statement failed
    #[error("Update failed: {message}")]
    Update { sql: String, message: String },

    /// A result column has a type that cannot be converted
    #[error("Unsupported result type for column '{column}': {data_type}")]
    UnsupportedType { column: String, data_type: String },

    /// A table could not be registered with the engine
    #[error("Failed to register table '{table}': {message}")]
    Registration { table: String, message: String },
}

impl ConnectionError {
    pub fn query(sql: impl Into<String>, message: impl ToString) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    pub fn update(sql: impl Into<String>, message: impl ToString) -> Self {
        Self::Update {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    pub fn unsupported_type(column: impl Into<String>, data_type: impl ToString) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            data_type: data_type.to_string(),
        }
    }

    pub fn registration(table: impl Into<String>, message: impl ToString) -> Self {
        Self::Registration {
            table: table.into(),
            message: message.to_string(),
        }
    }
}

/// Errors that stop one contract from being verified.
///
/// None of these abort a run: the orchestrator records them as diagnostics
/// and continues with the remaining contracts.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The contract names a data source that is not registered
    #[error("Unknown data source '{name}'")]
    UnknownDataSource {
        name: String,
        location: Option<SourceLocation>,
    },

    /// Neither the contract nor the run names a data source
    #[error("No data source for dataset '{dataset}', set 'data_source' or register one")]
    NoDataSource {
        dataset: String,
        location: Option<SourceLocation>,
    },

    /// A contract file could not be read
    #[error("Failed to read contract '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl VerificationError {
    pub fn unknown_data_source(name: impl Into<String>, location: Option<&SourceLocation>) -> Self {
        Self::UnknownDataSource {
            name: name.into(),
            location: location.cloned(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Location in a contract document the error refers to, if any.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Contract(err) => err.location(),
            Self::UnknownDataSource { location, .. } | Self::NoDataSource { location, .. } => {
                location.as_ref()
            }
            Self::Parser(_) | Self::Connection(_) | Self::Io { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConnectionError::query("SELECT 1;", "table not found");
        assert_eq!(err.to_string(), "Query failed: table not found");

        let location = SourceLocation::new("orders.yml", 2, 14);
        let err = VerificationError::unknown_data_source("warehouse", Some(&location));
        assert_eq!(err.to_string(), "Unknown data source 'warehouse'");
        assert_eq!(err.location(), Some(&location));
    }

    #[test]
    fn test_contract_error_keeps_location() {
        let root = SourceLocation::start_of("orders.yml");
        let err: VerificationError = ContractError::missing_dataset(&root).into();
        assert_eq!(err.location(), Some(&root));
        assert_eq!(err.to_string(), "'dataset' is required");
    }
}
