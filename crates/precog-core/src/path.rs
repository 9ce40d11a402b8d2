//! Field path utilities
//!
//! A field path is a dot-joined address into form data (`address.city`,
//! `tags.0`). Purely numeric segments index arrays. Paths are the key for
//! touched state and error state on both the client and the server side.
//!
//! Everything in this module is a pure function over [`serde_json::Value`].

use serde_json::{Map, Value};
use std::fmt;

use crate::error::PathError;

/// Largest number of `null` slots [`set`] pads onto an array
pub const MAX_ARRAY_PADDING: usize = 10_000;

/// One segment of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key
    Key(String),
    /// Array index (also usable as an object key)
    Index(usize),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.parse::<usize>() {
            Ok(index) if index.to_string() == raw => Segment::Index(index),
            _ => Segment::Key(raw.to_string()),
        }
    }

    fn as_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Split a dot path into segments
pub fn split(path: &str) -> Result<Vec<Segment>, PathError> {
    if path.is_empty() {
        return Err(PathError::EmptySegment(path.to_string()));
    }

    path.split('.')
        .map(|raw| {
            if raw.is_empty() {
                Err(PathError::EmptySegment(path.to_string()))
            } else {
                Ok(Segment::parse(raw))
            }
        })
        .collect()
}

/// Join segments back into a dot path
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

/// Enumerate every leaf path of a value, in document order.
///
/// Objects and arrays are descended; scalars, `null`, and empty containers
/// are leaves. The root itself is never reported.
pub fn leaf_paths(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    walk(value, &mut prefix, &mut out);
    out
}

fn walk(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                prefix.push(index.to_string());
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(join(prefix));
            }
        }
    }
}

/// Read the value at `path`, if present
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = split(path).ok()?;
    let mut current = value;

    for segment in &segments {
        current = match (current, segment) {
            (Value::Object(map), seg) => map.get(&seg.as_key())?,
            (Value::Array(items), Segment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Write `new` at `path`, creating missing containers along the way.
///
/// Missing intermediates become arrays when the next segment is numeric and
/// objects otherwise. Arrays are padded with `null` up to the target index,
/// at most [`MAX_ARRAY_PADDING`] slots past their current end.
pub fn set(value: &mut Value, path: &str, new: Value) -> Result<(), PathError> {
    let segments = split(path)?;
    let mut current = value;

    for (depth, segment) in segments.iter().enumerate() {
        let last = depth + 1 == segments.len();
        let next_is_index = segments
            .get(depth + 1)
            .map(|s| matches!(s, Segment::Index(_)))
            .unwrap_or(false);

        if current.is_null() {
            *current = match segment {
                Segment::Index(_) => Value::Array(Vec::new()),
                Segment::Key(_) => Value::Object(Map::new()),
            };
        }

        let slot = match (current, segment) {
            (Value::Object(map), seg) => map.entry(seg.as_key()).or_insert(Value::Null),
            (Value::Array(items), Segment::Index(index)) => {
                let len = items.len();
                if len <= *index {
                    let out_of_range = || PathError::IndexOutOfRange {
                        path: path.to_string(),
                        index: *index,
                        len,
                    };
                    if *index - len >= MAX_ARRAY_PADDING {
                        return Err(out_of_range());
                    }
                    let new_len = index.checked_add(1).ok_or_else(out_of_range)?;
                    items.resize(new_len, Value::Null);
                }
                &mut items[*index]
            }
            (Value::Array(_), Segment::Key(key)) => {
                return Err(PathError::NotAnIndex {
                    path: path.to_string(),
                    segment: key.clone(),
                });
            }
            _ => {
                return Err(PathError::NotAContainer {
                    path: path.to_string(),
                    at: join(&prefix_of(&segments, depth)),
                });
            }
        };

        if last {
            *slot = new;
            return Ok(());
        }

        if slot.is_null() {
            *slot = if next_is_index {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
        }

        current = slot;
    }

    Ok(())
}

fn prefix_of(segments: &[Segment], depth: usize) -> Vec<String> {
    segments[..depth].iter().map(Segment::as_key).collect()
}

/// Convert an RFC 6901 JSON pointer (`/tags/0`) into a dot path (`tags.0`)
pub fn from_pointer(pointer: &str) -> String {
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|raw| raw.replace("~1", "/").replace("~0", "~"))
        .collect();
    join(&segments)
}

/// Whether `path` is `key` itself or lies underneath it.
///
/// `covers("address", "address.city")` is true; `covers("tags.1", "tags.0")`
/// and `covers("tag", "tags")` are false.
pub fn covers(key: &str, path: &str) -> bool {
    match path.strip_prefix(key) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}
