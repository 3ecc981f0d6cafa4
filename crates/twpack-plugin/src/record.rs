//! Host tiddler records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Serializes a value the way the host pretty prints JSON (4-space indent).
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn to_host_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// A flat, string-keyed tiddler record as the host serializes it.
///
/// Fields are kept sorted by key so that serializing the same record twice
/// yields identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TiddlerRecord(BTreeMap<String, Value>);

impl TiddlerRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON value, if it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map.into_iter().collect())),
            _ => None,
        }
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Gets a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Gets a field when it holds a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns whether the field is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the record title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates mutably over field values in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.0.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_object() {
        let record = TiddlerRecord::from_value(json!({"title": "A", "text": "hi"})).unwrap();
        assert_eq!(record.title(), Some("A"));
        assert_eq!(record.get_str("text"), Some("hi"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(TiddlerRecord::from_value(json!(["a"])).is_none());
        assert!(TiddlerRecord::from_value(json!("a")).is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut record = TiddlerRecord::new();
        assert!(record.is_empty());
        assert!(record.insert("title", "A").is_none());
        assert_eq!(record.insert("title", "B"), Some(json!("A")));
        assert!(record.contains("title"));
        assert_eq!(record.title(), Some("B"));
        assert!(!record.contains("text"));
    }

    #[test]
    fn test_serializes_sorted_keys() {
        let mut record = TiddlerRecord::new();
        record.insert("version", "1.0.0");
        record.insert("title", "$:/plugins/a/b");
        record.insert("author", "a");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"author":"a","title":"$:/plugins/a/b","version":"1.0.0"}"#
        );
    }

    #[test]
    fn test_to_host_json_indent() {
        let mut record = TiddlerRecord::new();
        record.insert("title", "A");
        let json = to_host_json(&[record]).unwrap();
        assert_eq!(json, "[\n    {\n        \"title\": \"A\"\n    }\n]");
    }

    #[test]
    fn test_get_str_non_string() {
        let record = TiddlerRecord::from_value(json!({"count": 3})).unwrap();
        assert!(record.get_str("count").is_none());
        assert_eq!(record.get("count"), Some(&json!(3)));
    }
}
