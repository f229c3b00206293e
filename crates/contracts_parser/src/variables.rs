//! `${NAME}` placeholder substitution in contract text.

use contracts_core::{DiagnosticsLog, SourceLocation};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static VARIABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").expect("variable pattern is a valid regex")
});

/// Replaces every `${NAME}` in `text` with its value from `variables`.
///
/// Unknown names are recorded as errors at the placeholder position and the
/// placeholder is left in place.
pub fn substitute_variables(
    text: &str,
    file: &Arc<str>,
    variables: &HashMap<String, String>,
    log: &DiagnosticsLog,
) -> String {
    VARIABLE_REGEX
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    let start = caps.get(0).map_or(0, |m| m.start());
                    log.error(
                        format!("Variable '{}' is not defined", name),
                        Some(&location_of(text, start, file)),
                    );
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn location_of(text: &str, offset: usize, file: &Arc<str>) -> SourceLocation {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    SourceLocation::new(file.clone(), line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_variables() {
        let log = DiagnosticsLog::new();
        let file: Arc<str> = Arc::from("orders.yml");
        let text = "dataset: orders\nschema: ${SCHEMA}\ndatabase: ${ DB }\n";
        let result = substitute_variables(
            text,
            &file,
            &vars(&[("SCHEMA", "staging"), ("DB", "analytics")]),
            &log,
        );
        assert_eq!(result, "dataset: orders\nschema: staging\ndatabase: analytics\n");
        assert!(log.is_empty());
    }

    #[test]
    fn test_unknown_variable_is_located_and_kept() {
        let log = DiagnosticsLog::new();
        let file: Arc<str> = Arc::from("orders.yml");
        let text = "dataset: orders\nschema: ${MISSING}\n";
        let result = substitute_variables(text, &file, &HashMap::new(), &log);

        assert_eq!(result, text);
        let records = log.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "Variable 'MISSING' is not defined");
        assert_eq!(records[0].location, Some(SourceLocation::new("orders.yml", 2, 9)));
    }

    #[test]
    fn test_text_without_placeholders_is_unchanged() {
        let log = DiagnosticsLog::new();
        let file: Arc<str> = Arc::from("a.yml");
        let text = "filter: amount > 0 and note <> '$'\n";
        assert_eq!(substitute_variables(text, &file, &HashMap::new(), &log), text);
    }
}
