//! Response field extraction
//!
//! Each destination session key is paired with an [`ExtractionRule`] that says
//! how to locate the source value in a parsed JSON response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How to locate a value inside a response document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawExtractionRule")]
pub enum ExtractionRule {
    /// Structured path: `data.items[0].id`, `$.data.token` or a JSON pointer
    /// such as `/data/token`
    #[serde(rename = "path")]
    ByPath(String),

    /// Depth-first search for the first field with this name
    #[serde(rename = "name")]
    ByName(String),
}

/// Accepted configuration shapes: a bare field name, or a tagged object
#[derive(Deserialize)]
#[serde(untagged)]
enum RawExtractionRule {
    Name(String),
    Tagged(TaggedRule),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaggedRule {
    Path(String),
    Name(String),
}

impl From<RawExtractionRule> for ExtractionRule {
    fn from(raw: RawExtractionRule) -> Self {
        match raw {
            RawExtractionRule::Name(name) | RawExtractionRule::Tagged(TaggedRule::Name(name)) => {
                Self::ByName(name)
            }
            RawExtractionRule::Tagged(TaggedRule::Path(path)) => Self::ByPath(path),
        }
    }
}

impl ExtractionRule {
    /// Locate the source value. `null` is treated as absent.
    pub fn locate<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let found = match self {
            Self::ByPath(path) => find_by_path(document, path),
            Self::ByName(name) => find_by_name(document, name),
        };
        found.filter(|value| !value.is_null())
    }

    /// Human-readable source description for logs
    pub fn source(&self) -> &str {
        match self {
            Self::ByPath(path) | Self::ByName(path) => path,
        }
    }
}

/// Depth-first, document-order search for the first non-null field named `name`
pub fn find_by_name<'a>(document: &'a Value, name: &str) -> Option<&'a Value> {
    match document {
        Value::Object(map) => {
            for (key, value) in map {
                if key == name && !value.is_null() {
                    return Some(value);
                }
                if let Some(found) = find_by_name(value, name) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(|item| find_by_name(item, name)),
        _ => None,
    }
}

/// Resolve a structured path expression
pub fn find_by_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if path.starts_with('/') {
        return document.pointer(path);
    }

    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Some(document);
    }

    let mut current = document;
    for segment in path.split('.') {
        let (field, indices) = split_indices(segment)?;
        if !field.is_empty() {
            current = current.get(field)?;
        }
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Split `items[0][2]` into (`items`, [0, 2])
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };

    let field = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((field, indices))
}
