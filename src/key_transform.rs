//! Recursive object key renaming
//!
//! Used to normalize REST response field names on the way in
//! (`snake_case` -> `camelCase`, say) and to denormalize request bodies on the
//! way out.

use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Keys that are copied through without renaming
const PROTECTED_KEYS: &[&str] = &["__typename"];

/// Renames one object key given its key path from the root of the value.
///
/// Both one-argument and keypath-aware functions are supported through
/// [`FieldNameNormalizer::from_fn`] and [`FieldNameNormalizer::from_keypath_fn`].
#[derive(Clone)]
pub struct FieldNameNormalizer {
    convert: Arc<dyn Fn(&str, &[String]) -> String + Send + Sync>,
}

impl FieldNameNormalizer {
    /// Wrap a function of the key name only
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            convert: Arc::new(move |name, _| f(name)),
        }
    }

    /// Wrap a function of the key name and its key path
    pub fn from_keypath_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &[String]) -> String + Send + Sync + 'static,
    {
        Self {
            convert: Arc::new(f),
        }
    }

    /// Leaves every key untouched
    pub fn identity() -> Self {
        Self::from_fn(str::to_string)
    }

    pub fn normalize(&self, name: &str, keypath: &[String]) -> String {
        (self.convert)(name, keypath)
    }
}

impl std::fmt::Debug for FieldNameNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldNameNormalizer").finish_non_exhaustive()
    }
}

/// Rename every key of `value`, descending into nested objects and arrays
pub fn convert_object_keys(value: JsonValue, converter: &FieldNameNormalizer) -> JsonValue {
    let mut keypath = Vec::new();
    convert_inner(value, converter, &mut keypath)
}

fn convert_inner(
    value: JsonValue,
    converter: &FieldNameNormalizer,
    keypath: &mut Vec<String>,
) -> JsonValue {
    match value {
        JsonValue::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    keypath.push(index.to_string());
                    let converted = convert_inner(item, converter, keypath);
                    keypath.pop();
                    converted
                })
                .collect(),
        ),
        JsonValue::Object(map) => {
            let mut converted = Map::with_capacity(map.len());
            for (key, value) in map {
                if PROTECTED_KEYS.contains(&key.as_str()) {
                    converted.insert(key, value);
                    continue;
                }
                keypath.push(key.clone());
                let name = converter.normalize(&key, keypath);
                let value = convert_inner(value, converter, keypath);
                keypath.pop();
                converted.insert(name, value);
            }
            JsonValue::Object(converted)
        }
        scalar => scalar,
    }
}
