//! Builds a located [`Value`] tree from the YAML event stream.

use contracts_core::{
    DiagnosticsLog, Number, ObjectEntry, SourceLocation, Value, YamlBoolean, YamlList,
    YamlNumber, YamlObject, YamlString,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use yaml_rust::Yaml;
use yaml_rust::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust::scanner::{Marker, TScalarStyle, TokenType};

/// What the enclosing mapping expects next.
enum KeyState {
    Expecting,
    Key(String, SourceLocation),
    /// The key was rejected, drop the value that follows
    Skip,
}

enum Frame {
    Object {
        location: SourceLocation,
        entries: Vec<ObjectEntry>,
        key: KeyState,
        anchor: usize,
    },
    List {
        location: SourceLocation,
        items: Vec<Value>,
        anchor: usize,
    },
}

struct TreeBuilder<'a> {
    file: Arc<str>,
    log: &'a DiagnosticsLog,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
}

impl<'a> TreeBuilder<'a> {
    fn new(file: Arc<str>, log: &'a DiagnosticsLog) -> Self {
        Self {
            file,
            log,
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
        }
    }

    fn location(&self, mark: Marker) -> SourceLocation {
        SourceLocation::new(self.file.clone(), mark.line(), mark.col() + 1)
    }

    fn remember(&mut self, anchor: usize, value: &Value) {
        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }
    }

    /// Scalars in key position become keys directly, keeping their raw text.
    fn on_scalar(
        &mut self,
        text: String,
        style: TScalarStyle,
        anchor: usize,
        tag: Option<TokenType>,
        location: SourceLocation,
    ) {
        if let Some(Frame::Object {
            key: key @ KeyState::Expecting,
            ..
        }) = self.stack.last_mut()
        {
            *key = KeyState::Key(text, location);
            return;
        }
        let value = scalar_value(text, style, tag, location);
        self.remember(anchor, &value);
        self.attach(value);
    }

    fn attach(&mut self, value: Value) {
        let log = self.log;
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(value);
                }
            }
            Some(Frame::List { items, .. }) => items.push(value),
            Some(Frame::Object { entries, key, .. }) => {
                match std::mem::replace(key, KeyState::Expecting) {
                    KeyState::Expecting => match scalar_text(&value) {
                        Some(text) => *key = KeyState::Key(text, value.location().clone()),
                        None => {
                            log.error(
                                format!(
                                    "Keys must be scalars, but was {}",
                                    value.value_type().with_article()
                                ),
                                Some(value.location()),
                            );
                            *key = KeyState::Skip;
                        }
                    },
                    KeyState::Key(name, key_location) => {
                        if entries.iter().any(|entry| entry.key == name) {
                            log.error(format!("Duplicate key '{}'", name), Some(&key_location));
                        } else {
                            entries.push(ObjectEntry {
                                key: name,
                                key_location,
                                value,
                            });
                        }
                    }
                    KeyState::Skip => {}
                }
            }
        }
    }

    fn close(&mut self) {
        let (value, anchor) = match self.stack.pop() {
            Some(Frame::Object {
                location,
                entries,
                anchor,
                ..
            }) => (Value::Object(YamlObject::new(location, entries)), anchor),
            Some(Frame::List {
                location,
                items,
                anchor,
            }) => (Value::List(YamlList::new(location, items)), anchor),
            None => return,
        };
        self.remember(anchor, &value);
        self.attach(value);
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        let location = self.location(mark);
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                self.on_scalar(text, style, anchor, tag, location);
            }
            Event::MappingStart(anchor) => self.stack.push(Frame::Object {
                location,
                entries: Vec::new(),
                key: KeyState::Expecting,
                anchor,
            }),
            Event::SequenceStart(anchor) => self.stack.push(Frame::List {
                location,
                items: Vec::new(),
                anchor,
            }),
            Event::MappingEnd | Event::SequenceEnd => self.close(),
            Event::Alias(anchor) => match self.anchors.get(&anchor).cloned() {
                Some(value) => self.attach(value),
                None => self.log.error("Alias refers to an unknown anchor", Some(&location)),
            },
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}
        }
    }
}

fn scalar_value(
    text: String,
    style: TScalarStyle,
    tag: Option<TokenType>,
    location: SourceLocation,
) -> Value {
    let explicit_string = matches!(
        &tag,
        Some(TokenType::Tag(handle, suffix)) if handle == "!!" && suffix == "str"
    );
    if style != TScalarStyle::Plain || explicit_string {
        return Value::String(YamlString::new(text, location));
    }

    let resolved = Yaml::from_str(&text);
    match resolved {
        Yaml::Integer(value) => Value::Number(YamlNumber {
            value: Number::Integer(value),
            location,
        }),
        Yaml::Real(_) => match resolved.as_f64() {
            Some(value) => Value::Number(YamlNumber {
                value: Number::Float(value),
                location,
            }),
            None => Value::String(YamlString::new(text, location)),
        },
        Yaml::Boolean(value) => Value::Boolean(YamlBoolean { value, location }),
        Yaml::Null => Value::Null(location),
        _ => Value::String(YamlString::new(text, location)),
    }
}

/// Text of a scalar used in key position, `None` for collections.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.value.clone()),
        Value::Number(n) => Some(n.value.to_string()),
        Value::Boolean(b) => Some(b.value.to_string()),
        Value::Null(_) => Some("null".to_string()),
        Value::Object(_) | Value::List(_) => None,
    }
}

/// Parses the first YAML document in `text` into a located value tree.
///
/// Structural problems are recorded in `log`. A syntax error yields a single
/// located error and no tree.
pub fn load_value(text: &str, file: Arc<str>, log: &DiagnosticsLog) -> Option<Value> {
    let mut builder = TreeBuilder::new(file.clone(), log);
    let mut parser = Parser::new(text.chars());

    if let Err(err) = parser.load(&mut builder, false) {
        let mark = err.marker();
        let location = SourceLocation::new(file, mark.line(), mark.col() + 1);
        log.error(format!("Invalid YAML: {}", err), Some(&location));
        return None;
    }

    debug!(file = %builder.file, parsed = builder.root.is_some(), "Loaded YAML document");
    builder.root
}
