//! Typed views of the `@rest`, `@export` and `@type` directives

use crate::document::Field;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;

pub const REST_DIRECTIVE: &str = "rest";
pub const EXPORT_DIRECTIVE: &str = "export";
pub const TYPE_DIRECTIVE: &str = "type";

/// Arguments of `@rest(...)`
///
/// `pathBuilder`, `bodyBuilder`, `fieldNameDenormalizer`, `typePatcher` and
/// `bodySerializer` name strategies registered on the link.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestDirective {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub path_builder: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub body_key: Option<String>,
    #[serde(default)]
    pub body_builder: Option<String>,
    #[serde(default)]
    pub field_name_denormalizer: Option<String>,
    #[serde(default)]
    pub type_patcher: Option<String>,
    #[serde(default)]
    pub body_serializer: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Where the request path comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource<'a> {
    Template(&'a str),
    Builder(&'a str),
}

impl RestDirective {
    /// Exactly one of `path` and `pathBuilder` must be set
    pub fn path_source(&self) -> Result<PathSource<'_>> {
        match (&self.path, &self.path_builder) {
            (Some(path), None) => Ok(PathSource::Template(path)),
            (None, Some(builder)) => Ok(PathSource::Builder(builder)),
            (Some(_), Some(_)) => Err(Error::configuration(path_state_message(
                "both, please remove one!",
            ))),
            (None, None) => Err(Error::configuration(path_state_message(
                "neither, please add one!",
            ))),
        }
    }

    /// Argument holding the mutation body when no body builder is named
    pub fn body_key(&self) -> &str {
        self.body_key.as_deref().unwrap_or("input")
    }
}

fn path_state_message(state: &str) -> String {
    format!(
        "One and only one of (\"path\" | \"pathBuilder\") must be set in the @rest() directive. This request had {}",
        state
    )
}

/// Arguments of `@export(as:)`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportDirective {
    #[serde(rename = "as")]
    pub as_name: String,
}

/// Arguments of `@type(name:)`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeDirective {
    pub name: String,
}

/// How a field is resolved, decided once per visit
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Read the value from the parent result
    Leaf,
    /// Read the parent value and tag it with `@type(name:)`
    TypeOnly(TypeDirective),
    /// Resolve with an HTTP call
    RestCall(RestDirective),
    /// A non-leaf without `@rest`, read from the parent result
    PassThrough,
}

impl FieldKind {
    pub fn classify(field: &Field) -> Result<Self> {
        let rest = field.directive(REST_DIRECTIVE);

        if !field.is_leaf() {
            if let Some(type_directive) = field.directive(TYPE_DIRECTIVE) {
                if rest.is_some() {
                    return Err(Error::configuration(
                        "Invalid use of @type(name: ...) directive on a call that also has @rest(...)",
                    ));
                }
                return Ok(FieldKind::TypeOnly(decode(
                    TYPE_DIRECTIVE,
                    &type_directive.arguments,
                )?));
            }
        }

        match rest {
            Some(directive) => Ok(FieldKind::RestCall(decode(
                REST_DIRECTIVE,
                &directive.arguments,
            )?)),
            None if field.is_leaf() => Ok(FieldKind::Leaf),
            None => Ok(FieldKind::PassThrough),
        }
    }
}

/// The `@export(as:)` name of a field, if any
pub fn export_name(field: &Field) -> Result<Option<String>> {
    field
        .directive(EXPORT_DIRECTIVE)
        .map(|d| decode::<ExportDirective>(EXPORT_DIRECTIVE, &d.arguments).map(|e| e.as_name))
        .transpose()
}

fn decode<T: DeserializeOwned>(
    directive: &str,
    arguments: &serde_json::Map<String, JsonValue>,
) -> Result<T> {
    serde_json::from_value(JsonValue::Object(arguments.clone())).map_err(|e| {
        Error::configuration(format!("Invalid arguments for @{}: {}", directive, e))
    })
}
