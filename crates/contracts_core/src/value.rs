//! Location-annotated value tree for contract documents.
//!
//! The parser turns raw YAML text into a [`Value`] tree in which every node
//! carries its [`SourceLocation`]. Contract and check parsing then reads the
//! tree through typed accessors on [`YamlObject`]. Accessors never panic and
//! never coerce: a missing required key or a value of the wrong type is
//! recorded in the [`DiagnosticsLog`] and the accessor returns `None`, so the
//! caller can keep parsing the rest of the document.

use crate::{DiagnosticsLog, SourceLocation};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Documentation anchor for string value rules.
pub const STRING_TYPES_DOCS: &str = "contract-format.md#string-types";

/// Maximum length of a name value.
pub const MAX_NAME_LENGTH: usize = 120;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9]+[._-])*[A-Za-z0-9]+@[A-Za-z0-9-]+(?:\.[A-Za-z]{2,})+$")
        .expect("email pattern is a valid regex")
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("id pattern is a valid regex"));

/// Numeric scalar as it appeared in the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integer literal
    Integer(i64),
    /// Floating point literal
    Float(f64),
}

impl Number {
    /// Returns the value as a float.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Integer(i)
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

/// The variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Object,
    List,
    String,
    Number,
    Boolean,
    Null,
}

impl ValueType {
    /// Type name with an indefinite article, for messages.
    pub fn with_article(&self) -> &'static str {
        match self {
            ValueType::Object => "an object",
            ValueType::List => "a list",
            ValueType::String => "a string",
            ValueType::Number => "a number",
            ValueType::Boolean => "a boolean",
            ValueType::Null => "null",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Object => "object",
            ValueType::List => "list",
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Null => "null",
        };
        write!(f, "{}", name)
    }
}

/// A node of the parsed document. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Object(YamlObject),
    List(YamlList),
    String(YamlString),
    Number(YamlNumber),
    Boolean(YamlBoolean),
    Null(SourceLocation),
}

impl Value {
    /// Location of this node.
    pub fn location(&self) -> &SourceLocation {
        match self {
            Value::Object(o) => &o.location,
            Value::List(l) => &l.location,
            Value::String(s) => &s.location,
            Value::Number(n) => &n.location,
            Value::Boolean(b) => &b.location,
            Value::Null(location) => location,
        }
    }

    /// Variant tag of this node.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Object(_) => ValueType::Object,
            Value::List(_) => ValueType::List,
            Value::String(_) => ValueType::String,
            Value::Number(_) => ValueType::Number,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Null(_) => ValueType::Null,
        }
    }

    pub fn as_object(&self) -> Option<&YamlObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&YamlList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&YamlString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&YamlNumber> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&YamlBoolean> {
        match self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Returns true for strings, numbers, booleans and null.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Object(_) | Value::List(_))
    }
}

/// One `key: value` entry of an object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub key_location: SourceLocation,
    pub value: Value,
}

/// Ordered mapping of string keys to values.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlObject {
    location: SourceLocation,
    entries: Vec<ObjectEntry>,
}

impl YamlObject {
    /// Creates an object from entries in document order.
    pub fn new(location: SourceLocation, entries: Vec<ObjectEntry>) -> Self {
        Self { location, entries }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn entries(&self) -> &[ObjectEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Raw lookup without any diagnostics.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    /// Reads a value, logging a located error on absence or type mismatch.
    ///
    /// - absent and `required`: logs `'<key>' is required` at this object's
    ///   location and returns `None`
    /// - present but not of `expected` type: logs the mismatch at the value's
    ///   location and still returns the value as-is
    /// - otherwise returns the value without logging
    pub fn read_value(
        &self,
        key: &str,
        expected: Option<ValueType>,
        required: bool,
        log: &DiagnosticsLog,
    ) -> Option<&Value> {
        let Some(value) = self.get(key) else {
            if required {
                log.error(format!("'{}' is required", key), Some(&self.location));
            }
            return None;
        };

        if let Some(expected) = expected {
            if value.value_type() != expected {
                log.error(
                    format!(
                        "'{}' expected {}, but was {}",
                        key,
                        expected.with_article(),
                        value.value_type().with_article()
                    ),
                    Some(value.location()),
                );
            }
        }

        Some(value)
    }

    fn read_typed<'a, T>(
        &'a self,
        key: &str,
        expected: ValueType,
        required: bool,
        log: &DiagnosticsLog,
        cast: impl FnOnce(&'a Value) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.read_value(key, Some(expected), required, log)
            .and_then(cast)
    }

    /// Reads a required object.
    pub fn read_object(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlObject> {
        self.read_typed(key, ValueType::Object, true, log, Value::as_object)
    }

    /// Reads an optional object.
    pub fn read_object_opt(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlObject> {
        self.read_typed(key, ValueType::Object, false, log, Value::as_object)
    }

    /// Reads a required list.
    pub fn read_list(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlList> {
        self.read_typed(key, ValueType::List, true, log, Value::as_list)
    }

    /// Reads an optional list.
    pub fn read_list_opt(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlList> {
        self.read_typed(key, ValueType::List, false, log, Value::as_list)
    }

    /// Reads a required string.
    pub fn read_string(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlString> {
        self.read_typed(key, ValueType::String, true, log, Value::as_string)
    }

    /// Reads an optional string.
    pub fn read_string_opt(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlString> {
        self.read_typed(key, ValueType::String, false, log, Value::as_string)
    }

    /// Reads an optional number.
    pub fn read_number_opt(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlNumber> {
        self.read_typed(key, ValueType::Number, false, log, Value::as_number)
    }

    /// Reads an optional boolean.
    pub fn read_bool_opt(&self, key: &str, log: &DiagnosticsLog) -> Option<&YamlBoolean> {
        self.read_typed(key, ValueType::Boolean, false, log, Value::as_boolean)
    }

    /// Reads an optional list of strings. Non-string items are logged and skipped.
    pub fn read_string_list_opt(&self, key: &str, log: &DiagnosticsLog) -> Option<Vec<&YamlString>> {
        let list = self.read_list_opt(key, log)?;
        let strings = list
            .iter()
            .filter_map(|item| {
                let string = item.as_string();
                if string.is_none() {
                    log.error(
                        format!(
                            "'{}' items must be strings, but found {}",
                            key,
                            item.value_type().with_article()
                        ),
                        Some(item.location()),
                    );
                }
                string
            })
            .collect();
        Some(strings)
    }
}

/// Ordered sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlList {
    location: SourceLocation,
    items: Vec<Value>,
}

impl YamlList {
    pub fn new(location: SourceLocation, items: Vec<Value>) -> Self {
        Self { location, items }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a YamlList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// String scalar with domain validators.
///
/// Validators record a located error on violation and return `false`; the
/// string itself stays usable so parsing can continue.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlString {
    pub value: String,
    pub location: SourceLocation,
}

impl YamlString {
    pub fn new(value: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            value: value.into(),
            location,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Single line, at most [`MAX_NAME_LENGTH`] characters.
    pub fn validate_name(&self, log: &DiagnosticsLog) -> bool {
        let valid = !self.value.contains('\n') && self.value.chars().count() <= MAX_NAME_LENGTH;
        if !valid {
            log.error_with_docs("Invalid name", Some(&self.location), STRING_TYPES_DOCS);
        }
        valid
    }

    /// Whole value must be an email address.
    pub fn validate_email(&self, log: &DiagnosticsLog) -> bool {
        let valid = EMAIL_REGEX.is_match(&self.value);
        if !valid {
            log.error_with_docs("Invalid email", Some(&self.location), STRING_TYPES_DOCS);
        }
        valid
    }

    /// Letters, digits and underscores only.
    pub fn validate_id(&self, log: &DiagnosticsLog) -> bool {
        let valid = ID_REGEX.is_match(&self.value);
        if !valid {
            log.error_with_docs("Invalid id", Some(&self.location), STRING_TYPES_DOCS);
        }
        valid
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YamlNumber {
    pub value: Number,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YamlBoolean {
    pub value: bool,
    pub location: SourceLocation,
}
