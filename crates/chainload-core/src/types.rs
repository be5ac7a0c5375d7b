//! Fundamental per-iteration types

use serde_json::Value;
use std::collections::HashMap;

/// One row of test data: header name to cell value
pub type TestDataRecord = HashMap<String, String>;

/// Mutable key/value scope carried through the steps of one iteration.
///
/// Seeded from a [`TestDataRecord`], then extended by each step's response
/// extraction. A fresh instance is built for every iteration and dropped when
/// the iteration ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    values: HashMap<String, Value>,
}

impl SessionState {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a session from one test-data record
    pub fn from_record(record: TestDataRecord) -> Self {
        Self {
            values: record
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        }
    }

    /// Look up a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Insert or overwrite a value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

/// Render a JSON value the way it should appear inside a URL or header.
///
/// Strings are emitted without quotes; everything else uses its compact JSON
/// form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
