use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A dotted path such as `user.screen_name` or `entities.urls.0.expanded_url`.
///
/// A segment made only of decimal digits addresses a sequence element, every
/// other segment addresses a mapping key. Resolution never fails: any shape
/// mismatch simply yields `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .map(|part| {
                if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                    match part.parse::<usize>() {
                        Ok(index) => Segment::Index(index),
                        // Too large to be an index of anything; never matches.
                        Err(_) => Segment::Index(usize::MAX),
                    }
                } else {
                    Segment::Key(part.to_string())
                }
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// The empty path, resolving to the value itself.
    pub fn root() -> Self {
        Self {
            raw: String::new(),
            segments: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn resolve<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for JsonPath {
    fn from(path: &str) -> Self {
        JsonPath::parse(path)
    }
}

/// Looks up `path` in `record`. A present `null` comes back as `Some(&Value::Null)`.
pub fn extract<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    JsonPath::parse(path).resolve(record)
}

pub fn extract_or<'a>(record: &'a Value, path: &str, default: &'a Value) -> &'a Value {
    extract(record, path).unwrap_or(default)
}

/// Same traversal as [`extract`], serialized with [`embed_json`].
pub fn extract_json(record: &Value, path: &str) -> Option<String> {
    extract(record, path).and_then(embed_json)
}

/// Compact JSON text for a sub-tree; `null` embeds as nothing.
pub fn embed_json(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        value => Some(value.to_string()),
    }
}
