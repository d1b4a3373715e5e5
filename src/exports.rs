//! Variables exported with `@export(as:)`
//!
//! Each execution starts with an empty [`ExportVariables`]. The resolver
//! clones it for every object it descends into, so exports recorded inside one
//! element of a list never leak into its siblings, while fields later in the
//! same selection set and everything nested below them see the value.

use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportVariables {
    values: Map<String, JsonValue>,
}

impl ExportVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exported value, replacing any earlier value with the same name
    pub fn record(&mut self, name: impl Into<String>, value: JsonValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name)
    }

    pub fn read_all(&self) -> &Map<String, JsonValue> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field arguments overlaid with the exported values; exports win on conflict
    pub fn merge_with_args(&self, args: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut merged = args.clone();
        for (name, value) in &self.values {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_read() {
        let mut exports = ExportVariables::new();
        assert!(exports.is_empty());

        exports.record("postId", json!(1));
        exports.record("postId", json!(2));

        assert_eq!(exports.get("postId"), Some(&json!(2)));
        assert_eq!(exports.read_all().len(), 1);
    }

    #[test]
    fn test_exports_override_args() {
        let mut exports = ExportVariables::new();
        exports.record("id", json!("exported"));

        let args = json!({"id": "argument", "limit": 10});
        let merged = exports.merge_with_args(args.as_object().unwrap());

        assert_eq!(merged["id"], json!("exported"));
        assert_eq!(merged["limit"], json!(10));
    }

    #[test]
    fn test_clones_are_independent() {
        let mut parent = ExportVariables::new();
        parent.record("a", json!(1));

        let mut child = parent.clone();
        child.record("b", json!(2));

        assert!(parent.get("b").is_none());
        assert_eq!(child.get("a"), Some(&json!(1)));
    }
}
