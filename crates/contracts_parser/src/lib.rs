//! Location-tracking parser for data quality contract documents.
//!
//! Contract text is turned into a [`Value`] tree in which every node knows the
//! file, line and column it came from. Parsing is fail-soft: problems are
//! appended to a [`DiagnosticsLog`] and the rest of the document is still
//! parsed, so one run reports every structural issue.
//!
//! # Example
//!
//! ```rust
//! use contracts_parser::parse;
//!
//! let yaml = r#"
//! dataset: orders
//! checks:
//!   - type: row_count
//! "#;
//!
//! let (value, log) = parse(yaml, "orders.yml");
//! let root = value.expect("document parses");
//! assert!(root.as_object().is_some_and(|o| o.contains_key("checks")));
//! assert!(!log.has_errors());
//! ```

mod loader;
mod variables;

use contracts_core::{DiagnosticsLog, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use loader::load_value;
pub use variables::substitute_variables;

/// Errors that prevent a document from being parsed at all.
#[derive(Debug, Error)]
pub enum ParserError {
    /// File I/O error
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported contract file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// JSON format (.json), read with the YAML loader
    Json,
}

/// Parses `text` into a value tree with a fresh diagnostics log.
///
/// `file_id` identifies the document in every [`contracts_core::SourceLocation`].
pub fn parse(text: &str, file_id: &str) -> (Option<Value>, DiagnosticsLog) {
    let log = DiagnosticsLog::new();
    let value = parse_yaml(text, file_id, &log);
    (value, log)
}

/// Parses `text` into a value tree, recording problems in `log`.
pub fn parse_yaml(text: &str, file_id: &str, log: &DiagnosticsLog) -> Option<Value> {
    load_value(text, Arc::from(file_id), log)
}

/// Substitutes `${NAME}` placeholders, then parses the result.
pub fn parse_yaml_with_variables(
    text: &str,
    file_id: &str,
    variables: &HashMap<String, String>,
    log: &DiagnosticsLog,
) -> Option<Value> {
    let file: Arc<str> = Arc::from(file_id);
    let substituted = substitute_variables(text, &file, variables, log);
    load_value(&substituted, file, log)
}

/// Detect the contract format from a file path based on its extension.
///
/// # Supported Extensions
///
/// * `.yaml`, `.yml` → `ContractFormat::Yaml`
/// * `.json` → `ContractFormat::Json`
///
/// # Errors
///
/// Returns `ParserError::InvalidExtension` if the file has no extension.
/// Returns `ParserError::UnsupportedFormat` if the extension is not recognized.
pub fn detect_format(path: &Path) -> Result<ContractFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(ContractFormat::Yaml),
        "json" => Ok(ContractFormat::Json),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}

/// Reads and parses a contract file.
///
/// The file path becomes the file identifier of every location. Only I/O and
/// format detection failures are errors; problems inside the document go to
/// `log`.
///
/// ```no_run
/// use contracts_core::DiagnosticsLog;
/// use contracts_parser::parse_file;
/// use std::collections::HashMap;
/// use std::path::Path;
///
/// let log = DiagnosticsLog::new();
/// let value = parse_file(Path::new("contracts/orders.yml"), &HashMap::new(), &log).unwrap();
/// println!("parsed: {}", value.is_some());
/// ```
pub fn parse_file(
    path: &Path,
    variables: &HashMap<String, String>,
    log: &DiagnosticsLog,
) -> Result<Option<Value>> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| ParserError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), ?format, "Parsing contract file");

    let file_id = path.display().to_string();
    Ok(parse_yaml_with_variables(&content, &file_id, variables, log))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts_core::SourceLocation;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_reports_all_problems() {
        let yaml = r#"
dataset: orders
dataset: again
checks:
  - type: row_count
    type: missing_count
"#;
        let (value, log) = parse(yaml, "orders.yml");
        assert!(value.is_some());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_parse_json_document() {
        let (value, log) = parse(r#"{"dataset": "orders", "checks": []}"#, "orders.json");
        let root = value.expect("json is valid yaml");
        let object = root.as_object().expect("object root");
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["dataset", "checks"]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_parse_with_variables() {
        let log = DiagnosticsLog::new();
        let variables = HashMap::from([("TABLE".to_string(), "orders".to_string())]);
        let value = parse_yaml_with_variables("dataset: ${TABLE}\n", "c.yml", &variables, &log)
            .expect("parses");
        let dataset = value
            .as_object()
            .and_then(|o| o.get("dataset"))
            .and_then(Value::as_string)
            .map(|s| s.value.clone());
        assert_eq!(dataset, Some("orders".to_string()));
    }

    #[test]
    fn test_file_id_flows_into_locations() {
        let (value, _) = parse("dataset: orders\n", "contracts/orders.yml");
        let location = value.map(|v| v.as_object().map(|o| o.entries()[0].key_location.clone()));
        assert_eq!(
            location,
            Some(Some(SourceLocation::new("contracts/orders.yml", 1, 1)))
        );
    }

    #[test]
    fn test_detect_format_yaml() {
        assert_eq!(detect_format(Path::new("contract.yaml")).unwrap(), ContractFormat::Yaml);
        assert_eq!(detect_format(Path::new("contract.YML")).unwrap(), ContractFormat::Yaml);
        assert_eq!(detect_format(Path::new("contract.json")).unwrap(), ContractFormat::Json);
    }

    #[test]
    fn test_detect_format_unsupported() {
        let result = detect_format(Path::new("contract.toml"));
        assert!(matches!(result, Err(ParserError::UnsupportedFormat(ext)) if ext == "toml"));
    }

    #[test]
    fn test_detect_format_no_extension() {
        let result = detect_format(Path::new("contract"));
        assert!(matches!(result, Err(ParserError::InvalidExtension)));
    }

    #[test]
    fn test_parse_file_missing() {
        let log = DiagnosticsLog::new();
        let result = parse_file(Path::new("does/not/exist.yml"), &HashMap::new(), &log);
        assert!(matches!(result, Err(ParserError::Io { .. })));
    }
}
