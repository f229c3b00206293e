//! Error types for contract documents.
//!
//! Most problems in a contract document are recorded as diagnostics and do not
//! stop parsing. The errors here are the structural ones after which no
//! contract can be built at all.

use crate::SourceLocation;
use thiserror::Error;

/// Result type for contract operations.
pub type Result<T> = std::result::Result<T, ContractError>;

/// A contract document that cannot be turned into a contract.
#[derive(Error, Debug)]
pub enum ContractError {
    /// The document has no `dataset` key
    #[error("'dataset' is required")]
    MissingDataset {
        /// Location of the document root
        location: SourceLocation,
    },

    /// The `dataset` key holds something other than a string
    #[error("'dataset' expected a string, but was {actual}")]
    InvalidDataset {
        /// Type description with article, e.g. "a number"
        actual: String,
        /// Location of the `dataset` value
        location: SourceLocation,
    },

    /// The document root is not a mapping
    #[error("Contract document must be an object, but was {actual}")]
    NotAnObject {
        /// Type description with article, e.g. "a list"
        actual: String,
        /// Location of the document root
        location: SourceLocation,
    },

    /// Parsing produced no value tree
    #[error("Contract document '{0}' is empty or could not be parsed")]
    EmptyDocument(String),
}

impl ContractError {
    /// Creates a missing dataset error.
    pub fn missing_dataset(location: &SourceLocation) -> Self {
        Self::MissingDataset {
            location: location.clone(),
        }
    }

    /// Location in the document the error refers to, if any.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::MissingDataset { location }
            | Self::InvalidDataset { location, .. }
            | Self::NotAnObject { location, .. } => Some(location),
            Self::EmptyDocument(_) => None,
        }
    }
}
