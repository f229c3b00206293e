//! Source locations attached to parsed contract values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position of a value in a contract document.
///
/// Lines and columns are 1-indexed. The file identifier is shared between all
/// locations of one document, so cloning a location is cheap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path or other identifier of the document
    pub file: Arc<str>,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Creates a new location.
    pub fn new(file: impl Into<Arc<str>>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location pointing at the start of a document.
    pub fn start_of(file: impl Into<Arc<str>>) -> Self {
        Self::new(file, 1, 1)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let location = SourceLocation::new("contracts/orders.yml", 12, 5);
        assert_eq!(location.to_string(), "contracts/orders.yml:12:5");
    }

    #[test]
    fn test_ordering_by_line_then_column() {
        let a = SourceLocation::new("a.yml", 2, 9);
        let b = SourceLocation::new("a.yml", 3, 1);
        let c = SourceLocation::new("a.yml", 3, 4);
        assert!(a < b);
        assert!(b < c);
    }
}
