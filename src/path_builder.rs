//! Request path construction
//!
//! A `@rest(path: ...)` template is expanded against the field arguments merged
//! with the exported variables. Two placeholder syntaxes are understood:
//!
//! - `:name` is replaced with the value named `name`
//! - `{args}`, `{args.key}` and `{exportVariables.key}` are replaced with the
//!   value found at that dotted path; objects become `key=value&...` query
//!   strings
//!
//! Scalars are inserted verbatim. Callers that need encoded path segments must
//! encode the values themselves, or register a [`PathBuilder`].

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};

pub(crate) const MISSING_PARAMETERS: &str = "Missing parameters to run query, specify it in the query params or use an export directive. (If you need to use \":\" inside a variable string make sure to encode the variables properly using `encodeURIComponent`. Alternatively see documentation about using pathBuilder.)";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([^{}]*)\}|:([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex is valid")
});

/// Values available while building a path
#[derive(Debug, Clone, Copy)]
pub struct PathBuilderProps<'a> {
    /// Field arguments merged with the exported variables
    pub args: &'a Map<String, JsonValue>,
    /// Variables exported so far with `@export(as:)`
    pub export_variables: &'a Map<String, JsonValue>,
}

/// Custom path construction, referenced by name from `@rest(pathBuilder:)`
pub trait PathBuilder: Send + Sync {
    fn build(&self, props: &PathBuilderProps<'_>) -> Result<String>;
}

impl<F> PathBuilder for F
where
    F: Fn(&PathBuilderProps<'_>) -> Result<String> + Send + Sync,
{
    fn build(&self, props: &PathBuilderProps<'_>) -> Result<String> {
        self(props)
    }
}

/// Expand a path template
pub fn build_path(template: &str, props: &PathBuilderProps<'_>) -> Result<String> {
    let mut missing = false;
    let path = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let resolved = match (caps.get(1), caps.get(2)) {
            (Some(expr), _) => resolve_expression(expr.as_str(), props),
            (None, Some(name)) => props
                .args
                .get(name.as_str())
                .filter(|v| !v.is_null())
                .map(json_value_to_string),
            _ => None,
        };
        resolved.unwrap_or_else(|| {
            missing = true;
            caps[0].to_string()
        })
    });

    if missing {
        return Err(Error::resolution(MISSING_PARAMETERS));
    }
    Ok(path.into_owned())
}

fn resolve_expression(expr: &str, props: &PathBuilderProps<'_>) -> Option<String> {
    let mut segments = expr.trim().split('.');
    let root = match segments.next()? {
        "args" => props.args,
        "exportVariables" => props.export_variables,
        _ => return None,
    };

    let mut current: Option<&JsonValue> = None;
    let mut current_map = root;
    for segment in segments {
        let value = current_map.get(segment)?;
        current = Some(value);
        match value {
            JsonValue::Object(map) => current_map = map,
            _ => current_map = &*EMPTY,
        }
    }

    match current {
        None => Some(encode_query(root)),
        Some(JsonValue::Null) => None,
        Some(JsonValue::Object(map)) => Some(encode_query(map)),
        Some(value) => Some(json_value_to_string(value)),
    }
}

static EMPTY: Lazy<Map<String, JsonValue>> = Lazy::new(Map::new);

/// Encode an object as `key=value` pairs joined by `&`
pub fn encode_query(map: &Map<String, JsonValue>) -> String {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k),
                urlencoding::encode(&json_value_to_string(v))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Convert a JSON value to the text inserted into a path
pub fn json_value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
        JsonValue::Array(items) => items
            .iter()
            .map(json_value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        JsonValue::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn build(template: &str, args: JsonValue) -> Result<String> {
        let args = map(args);
        let exports = Map::new();
        build_path(
            template,
            &PathBuilderProps {
                args: &args,
                export_variables: &exports,
            },
        )
    }

    #[test]
    fn test_colon_placeholder() {
        assert_eq!(build("/post/:id", json!({"id": 1})).unwrap(), "/post/1");
        assert_eq!(
            build("/post/:postId/comments/:id", json!({"postId": "a", "id": 7})).unwrap(),
            "/post/a/comments/7"
        );
    }

    #[test]
    fn test_repeated_placeholder_replaced_everywhere() {
        assert_eq!(
            build("/:id/copy/:id", json!({"id": 3})).unwrap(),
            "/3/copy/3"
        );
    }

    #[test]
    fn test_placeholder_prefix_not_confused() {
        assert_eq!(
            build("/:id/:idx", json!({"id": 1, "idx": 2})).unwrap(),
            "/1/2"
        );
    }

    #[test]
    fn test_missing_parameter() {
        let err = build("/post/:id", json!({})).unwrap_err();
        assert_eq!(err.to_string(), MISSING_PARAMETERS);
    }

    #[test]
    fn test_null_parameter_is_missing() {
        assert!(build("/post/:id", json!({"id": null})).is_err());
    }

    #[test]
    fn test_values_are_not_encoded() {
        assert_eq!(
            build("/search/:term", json!({"term": "a b/c"})).unwrap(),
            "/search/a b/c"
        );
    }

    #[test]
    fn test_inserted_colon_is_not_rescanned() {
        assert_eq!(
            build("/time/:at", json!({"at": "10:30:abc"})).unwrap(),
            "/time/10:30:abc"
        );
    }

    #[test]
    fn test_brace_args_object_is_query_encoded() {
        assert_eq!(
            build("/search?{args}", json!({"name": "Love apollo"})).unwrap(),
            "/search?name=Love%20apollo"
        );
    }

    #[test]
    fn test_brace_args_key_is_verbatim() {
        assert_eq!(
            build("/posts/{args.name}", json!({"name": "Love apollo"})).unwrap(),
            "/posts/Love apollo"
        );
    }

    #[test]
    fn test_brace_nested_object() {
        assert_eq!(
            build(
                "/posts/{args.id}?{args.query}",
                json!({"id": 1, "query": {"comments": 5}})
            )
            .unwrap(),
            "/posts/1?comments=5"
        );
    }

    #[test]
    fn test_brace_dotted_path() {
        assert_eq!(
            build("/users/{args.user.id}", json!({"user": {"id": 9}})).unwrap(),
            "/users/9"
        );
    }

    #[test]
    fn test_brace_export_variables() {
        let args = Map::new();
        let exports = map(json!({"postId": 12}));
        let path = build_path(
            "/post/{exportVariables.postId}/comments",
            &PathBuilderProps {
                args: &args,
                export_variables: &exports,
            },
        )
        .unwrap();
        assert_eq!(path, "/post/12/comments");
    }

    #[test]
    fn test_brace_missing_key() {
        let err = build("/posts/{args.missing}", json!({})).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn test_custom_path_builder() {
        let builder = |props: &PathBuilderProps<'_>| -> Result<String> {
            Ok(format!(
                "/search?q={}",
                urlencoding::encode(&json_value_to_string(&props.args["q"]))
            ))
        };
        let args = map(json!({"q": "a&b"}));
        let exports = Map::new();
        let props = PathBuilderProps {
            args: &args,
            export_variables: &exports,
        };
        assert_eq!(builder.build(&props).unwrap(), "/search?q=a%26b");
    }

    #[test]
    fn test_json_value_to_string() {
        assert_eq!(json_value_to_string(&json!("hello")), "hello");
        assert_eq!(json_value_to_string(&json!(42)), "42");
        assert_eq!(json_value_to_string(&json!(true)), "true");
        assert_eq!(json_value_to_string(&json!(null)), "null");
        assert_eq!(json_value_to_string(&json!([1, 2])), "1,2");
    }
}
