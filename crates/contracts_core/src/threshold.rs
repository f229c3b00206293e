//! Pass/fail thresholds for checks.
//!
//! A threshold is read from the threshold keys of a check node:
//!
//! ```yaml
//! - type: missing_count
//!   column: customer_id
//!   must_be_less_than: 10
//! - type: row_count
//!   must_be_between: [1, 1000]
//! ```
//!
//! A lower and an upper comparator on the same check combine into a range.
//! Malformed thresholds are recorded in the diagnostics log and
//! [`Threshold::create`] returns `None`, which downstream degrades the check
//! to not evaluated.

use crate::{DiagnosticsLog, SourceLocation, Value, YamlObject};
use serde::Serialize;
use std::fmt;

/// Keys that hold a single comparator threshold.
const COMPARATOR_KEYS: [(&str, Comparator); 6] = [
    ("must_be", Comparator::Equal),
    ("must_not_be", Comparator::NotEqual),
    ("must_be_greater_than", Comparator::GreaterThan),
    ("must_be_greater_than_or_equal", Comparator::GreaterThanOrEqual),
    ("must_be_less_than", Comparator::LessThan),
    ("must_be_less_than_or_equal", Comparator::LessThanOrEqual),
];

const BETWEEN_KEY: &str = "must_be_between";
const NOT_BETWEEN_KEY: &str = "must_be_not_between";

/// Documentation anchor for threshold configuration.
pub const THRESHOLD_DOCS: &str = "contract-format.md#thresholds";

/// Comparison operator of a single comparator threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    LessThan,
    LessThanOrEqual,
    Equal,
    GreaterThanOrEqual,
    GreaterThan,
    NotEqual,
}

impl Comparator {
    /// Evaluates `value <op> boundary`.
    pub fn compare(&self, value: f64, boundary: f64) -> bool {
        match self {
            Comparator::LessThan => value < boundary,
            Comparator::LessThanOrEqual => value <= boundary,
            Comparator::Equal => value == boundary,
            Comparator::GreaterThanOrEqual => value >= boundary,
            Comparator::GreaterThan => value > boundary,
            Comparator::NotEqual => value != boundary,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::Equal => "=",
            Comparator::GreaterThanOrEqual => ">=",
            Comparator::GreaterThan => ">",
            Comparator::NotEqual => "!=",
        }
    }

    fn phrase(&self) -> &'static str {
        match self {
            Comparator::LessThan => "must be less than",
            Comparator::LessThanOrEqual => "must be less than or equal to",
            Comparator::Equal => "must be",
            Comparator::GreaterThanOrEqual => "must be greater than or equal to",
            Comparator::GreaterThan => "must be greater than",
            Comparator::NotEqual => "must not be",
        }
    }
}

/// One end of a range threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bound {
    pub value: f64,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// A parsed, immutable pass/fail boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Threshold {
    /// `value <comparator> boundary`
    SingleComparator { comparator: Comparator, boundary: f64 },

    /// `lower <(=) value <(=) upper`, or the complement when `inside` is false
    Range {
        lower: Bound,
        upper: Bound,
        inside: bool,
    },
}

impl Threshold {
    /// Single comparator threshold.
    pub fn single(comparator: Comparator, boundary: f64) -> Self {
        Threshold::SingleComparator {
            comparator,
            boundary,
        }
    }

    /// `value == boundary`
    pub fn must_be(boundary: f64) -> Self {
        Self::single(Comparator::Equal, boundary)
    }

    /// Closed range `lower <= value <= upper`.
    pub fn between(lower: f64, upper: f64) -> Self {
        Threshold::Range {
            lower: Bound::inclusive(lower),
            upper: Bound::inclusive(upper),
            inside: true,
        }
    }

    /// Parses the threshold keys of a check node.
    ///
    /// Falls back to `default` when the node has no threshold keys at all. A
    /// node without threshold keys and without default, or with malformed
    /// threshold keys, is logged and yields `None`.
    pub fn create(
        check: &YamlObject,
        default: Option<Threshold>,
        log: &DiagnosticsLog,
    ) -> Option<Threshold> {
        let mut comparators: Vec<(&str, Comparator, f64)> = Vec::new();
        let mut valid = true;

        for (key, comparator) in COMPARATOR_KEYS {
            if let Some(value) = check.get(key) {
                match number_of(key, value, log) {
                    Some(boundary) => comparators.push((key, comparator, boundary)),
                    None => valid = false,
                }
            }
        }

        let range_keys: Vec<(&str, &Value)> = [BETWEEN_KEY, NOT_BETWEEN_KEY]
            .into_iter()
            .filter_map(|key| check.get(key).map(|value| (key, value)))
            .collect();

        if comparators.is_empty() && range_keys.is_empty() {
            if !valid {
                return None;
            }
            if default.is_none() {
                log.error_with_docs(
                    "Threshold is required, use one of the 'must_be...' keys",
                    Some(check.location()),
                    THRESHOLD_DOCS,
                );
            }
            return default;
        }

        if let Some((key, value)) = range_keys.first().copied() {
            if range_keys.len() > 1 || !comparators.is_empty() {
                log.error_with_docs(
                    format!("'{}' cannot be combined with other threshold keys", key),
                    Some(value.location()),
                    THRESHOLD_DOCS,
                );
                return None;
            }
            let (lower, upper) = parse_range(key, value, log)?;
            if !valid {
                return None;
            }
            return Some(Threshold::Range {
                lower,
                upper,
                inside: key == BETWEEN_KEY,
            });
        }

        if !valid {
            return None;
        }

        match comparators.as_slice() {
            [(_, comparator, boundary)] => Some(Threshold::single(*comparator, *boundary)),
            [first, second] => combine_comparators(check.location(), *first, *second, log),
            _ => {
                let keys: Vec<&str> = comparators.iter().map(|(key, _, _)| *key).collect();
                log.error_with_docs(
                    format!("Invalid threshold combination: {}", keys.join(", ")),
                    Some(check.location()),
                    THRESHOLD_DOCS,
                );
                None
            }
        }
    }

    /// Returns true if `value` satisfies the threshold.
    pub fn passes(&self, value: f64) -> bool {
        match self {
            Threshold::SingleComparator {
                comparator,
                boundary,
            } => comparator.compare(value, *boundary),
            Threshold::Range {
                lower,
                upper,
                inside,
            } => {
                let above_lower = if lower.inclusive {
                    value >= lower.value
                } else {
                    value > lower.value
                };
                let below_upper = if upper.inclusive {
                    value <= upper.value
                } else {
                    value < upper.value
                };
                (above_lower && below_upper) == *inside
            }
        }
    }

    /// Human-readable assertion, e.g. `missing_count must be 0`.
    pub fn assertion_summary(&self, metric_name: &str) -> String {
        format!("{} {}", metric_name, self)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::SingleComparator {
                comparator,
                boundary,
            } => write!(f, "{} {}", comparator.phrase(), boundary),
            Threshold::Range {
                lower,
                upper,
                inside: true,
            } if lower.inclusive && upper.inclusive => {
                write!(f, "must be between {} and {}", lower.value, upper.value)
            }
            Threshold::Range {
                lower,
                upper,
                inside: false,
            } if lower.inclusive && upper.inclusive => {
                write!(f, "must not be between {} and {}", lower.value, upper.value)
            }
            Threshold::Range {
                lower,
                upper,
                inside: true,
            } => write!(
                f,
                "must be {} {} and {} {}",
                if lower.inclusive { ">=" } else { ">" },
                lower.value,
                if upper.inclusive { "<=" } else { "<" },
                upper.value
            ),
            Threshold::Range {
                lower,
                upper,
                inside: false,
            } => write!(
                f,
                "must be {} {} or {} {}",
                if lower.inclusive { "<" } else { "<=" },
                lower.value,
                if upper.inclusive { ">" } else { ">=" },
                upper.value
            ),
        }
    }
}

fn number_of(key: &str, value: &Value, log: &DiagnosticsLog) -> Option<f64> {
    match value.as_number() {
        Some(number) => Some(number.value.as_f64()),
        None => {
            log.error_with_docs(
                format!(
                    "'{}' expected a number, but was {}",
                    key,
                    value.value_type().with_article()
                ),
                Some(value.location()),
                THRESHOLD_DOCS,
            );
            None
        }
    }
}

fn combine_comparators(
    location: &SourceLocation,
    first: (&str, Comparator, f64),
    second: (&str, Comparator, f64),
    log: &DiagnosticsLog,
) -> Option<Threshold> {
    let as_lower = |(_, comparator, value): (&str, Comparator, f64)| match comparator {
        Comparator::GreaterThan => Some(Bound::exclusive(value)),
        Comparator::GreaterThanOrEqual => Some(Bound::inclusive(value)),
        _ => None,
    };
    let as_upper = |(_, comparator, value): (&str, Comparator, f64)| match comparator {
        Comparator::LessThan => Some(Bound::exclusive(value)),
        Comparator::LessThanOrEqual => Some(Bound::inclusive(value)),
        _ => None,
    };

    let bounds = match (as_lower(first), as_upper(second)) {
        (Some(lower), Some(upper)) => Some((lower, upper)),
        _ => as_lower(second).zip(as_upper(first)),
    };

    let Some((lower, upper)) = bounds else {
        log.error_with_docs(
            format!("Invalid threshold combination: {}, {}", first.0, second.0),
            Some(location),
            THRESHOLD_DOCS,
        );
        return None;
    };

    if lower.value > upper.value {
        log.error_with_docs(
            format!(
                "Threshold lower bound {} is greater than upper bound {}",
                lower.value, upper.value
            ),
            Some(location),
            THRESHOLD_DOCS,
        );
        return None;
    }

    Some(Threshold::Range {
        lower,
        upper,
        inside: true,
    })
}

fn parse_range(key: &str, value: &Value, log: &DiagnosticsLog) -> Option<(Bound, Bound)> {
    let bounds = match value {
        Value::List(list) => {
            let numbers: Vec<f64> = list
                .iter()
                .filter_map(|item| item.as_number().map(|n| n.value.as_f64()))
                .collect();
            match numbers.as_slice() {
                [lower, upper] if list.len() == 2 => {
                    Some((Bound::inclusive(*lower), Bound::inclusive(*upper)))
                }
                _ => {
                    log.error_with_docs(
                        format!("'{}' expects a list of two numbers [lower, upper]", key),
                        Some(value.location()),
                        THRESHOLD_DOCS,
                    );
                    None
                }
            }
        }
        Value::Object(object) => {
            let lower = range_bound(
                key,
                object,
                ("greater_than", "greater_than_or_equal"),
                log,
            );
            let upper = range_bound(key, object, ("less_than", "less_than_or_equal"), log);
            lower.zip(upper)
        }
        other => {
            log.error_with_docs(
                format!(
                    "'{}' expected a list or an object, but was {}",
                    key,
                    other.value_type().with_article()
                ),
                Some(other.location()),
                THRESHOLD_DOCS,
            );
            None
        }
    }?;

    let (lower, upper) = bounds;
    if lower.value > upper.value {
        log.error_with_docs(
            format!(
                "'{}' lower bound {} is greater than upper bound {}",
                key, lower.value, upper.value
            ),
            Some(value.location()),
            THRESHOLD_DOCS,
        );
        return None;
    }
    Some(bounds)
}

fn range_bound(
    key: &str,
    object: &YamlObject,
    (exclusive_key, inclusive_key): (&str, &str),
    log: &DiagnosticsLog,
) -> Option<Bound> {
    match (object.get(exclusive_key), object.get(inclusive_key)) {
        (Some(value), None) => number_of(exclusive_key, value, log).map(Bound::exclusive),
        (None, Some(value)) => number_of(inclusive_key, value, log).map(Bound::inclusive),
        _ => {
            log.error_with_docs(
                format!(
                    "'{}' requires exactly one of '{}' or '{}'",
                    key, exclusive_key, inclusive_key
                ),
                Some(object.location()),
                THRESHOLD_DOCS,
            );
            None
        }
    }
}
