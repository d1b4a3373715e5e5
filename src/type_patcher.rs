//! Type tagging of REST responses
//!
//! REST payloads carry no GraphQL type information, so every object returned
//! from an `@rest` field is tagged with a `__typename`. Bracketed type names
//! (`[Post]`, `[[Tag]]`) are unwrapped one layer per array level. A
//! [`TypePatcherTable`] can override tagging per type, typically to tag nested
//! objects the response embeds.

use crate::document::TYPENAME_FIELD;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

static ARRAY_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(.*)\]").expect("bracket regex is valid"));

/// Per-type response patcher
///
/// Receives the object being tagged, its type name and the tagger, which can
/// be used to tag nested values via [`TypeTagger::patch`].
pub trait TypePatcher: Send + Sync {
    fn patch(&self, data: JsonValue, type_name: &str, tagger: &TypeTagger) -> Result<JsonValue>;
}

impl<F> TypePatcher for F
where
    F: Fn(JsonValue, &str, &TypeTagger) -> Result<JsonValue> + Send + Sync,
{
    fn patch(&self, data: JsonValue, type_name: &str, tagger: &TypeTagger) -> Result<JsonValue> {
        self(data, type_name, tagger)
    }
}

/// Patchers keyed by type name
pub type TypePatcherTable = HashMap<String, Arc<dyn TypePatcher>>;

/// Attaches `__typename` to response values
#[derive(Clone, Default)]
pub struct TypeTagger {
    table: Arc<TypePatcherTable>,
}

impl std::fmt::Debug for TypeTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeTagger")
            .field("types", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeTagger {
    pub fn new(table: TypePatcherTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Whether a patcher table is configured
    pub fn has_table(&self) -> bool {
        !self.table.is_empty()
    }

    /// Look up the patcher registered for a type
    pub fn patcher(&self, type_name: &str) -> Option<&Arc<dyn TypePatcher>> {
        self.table.get(type_name)
    }

    /// Tag a REST result with the `@rest(type:)` name
    pub fn tag(&self, value: JsonValue, type_name: &str) -> Result<JsonValue> {
        self.tag_with(value, type_name, None)
    }

    /// Tag a REST result, using `root` as the patcher for the outermost objects
    pub fn tag_with(
        &self,
        value: JsonValue,
        type_name: &str,
        root: Option<&dyn TypePatcher>,
    ) -> Result<JsonValue> {
        match value {
            JsonValue::Array(items) => {
                let inner = pop_one_set_of_array_brackets(type_name);
                items
                    .into_iter()
                    .map(|item| self.tag_with(item, &inner, root))
                    .collect::<Result<Vec<_>>>()
                    .map(JsonValue::Array)
            }
            JsonValue::Object(map) => match root {
                Some(patcher) => {
                    let type_name = existing_typename(&map).unwrap_or(type_name).to_string();
                    let patched = patcher.patch(JsonValue::Object(map), &type_name, self)?;
                    Ok(with_typename(patched, &type_name))
                }
                None if self.has_table() => self.patch(JsonValue::Object(map), type_name),
                None => {
                    if existing_typename(&map).is_some() {
                        return Ok(JsonValue::Object(map));
                    }
                    Ok(with_typename(JsonValue::Object(map), type_name))
                }
            },
            other => Ok(other),
        }
    }

    /// Tag a value through the patcher table.
    ///
    /// An object keeps its own `__typename` when it has one; the table entry
    /// for the effective type is then applied. Arrays are patched element by
    /// element with the same type name.
    pub fn patch(&self, value: JsonValue, type_name: &str) -> Result<JsonValue> {
        match value {
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.patch(item, type_name))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            JsonValue::Object(map) => {
                let type_name = existing_typename(&map).unwrap_or(type_name).to_string();
                let data = JsonValue::Object(map);
                let patched = match self.table.get(&type_name) {
                    Some(patcher) => patcher.patch(data, &type_name, self)?,
                    None => data,
                };
                Ok(with_typename(patched, &type_name))
            }
            other => Ok(other),
        }
    }
}

fn existing_typename(map: &Map<String, JsonValue>) -> Option<&str> {
    map.get(TYPENAME_FIELD)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

/// Put `__typename` first; a tag already set on the object wins
fn with_typename(value: JsonValue, type_name: &str) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut tagged = Map::with_capacity(map.len() + 1);
            tagged.insert(
                TYPENAME_FIELD.to_string(),
                JsonValue::String(type_name.to_string()),
            );
            for (key, value) in map {
                if key == TYPENAME_FIELD && value.is_null() {
                    continue;
                }
                tagged.insert(key, value);
            }
            JsonValue::Object(tagged)
        }
        other => other,
    }
}

/// Strip one layer of array brackets from a type name.
///
/// Whitespace is ignored, `[[Tag]]` becomes `[Tag]` and a name without
/// brackets is returned unchanged.
pub fn pop_one_set_of_array_brackets(type_name: &str) -> String {
    let no_space: String = type_name.chars().filter(|c| !c.is_whitespace()).collect();
    match ARRAY_BRACKETS.captures(&no_space) {
        Some(caps) if !caps[1].is_empty() => {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let mut popped = String::with_capacity(no_space.len());
            popped.push_str(&no_space[..whole.start]);
            popped.push_str(&caps[1]);
            popped.push_str(&no_space[whole.end..]);
            popped
        }
        _ => no_space,
    }
}

/// Overwrite the `__typename` of an object, or of every object in an array
pub fn add_type_to_node(node: JsonValue, type_name: &str) -> JsonValue {
    match node {
        JsonValue::Object(mut map) => {
            map.insert(
                TYPENAME_FIELD.to_string(),
                JsonValue::String(type_name.to_string()),
            );
            JsonValue::Object(map)
        }
        JsonValue::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .map(|item| add_type_to_node(item, type_name))
                .collect(),
        ),
        other => other,
    }
}
