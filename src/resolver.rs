//! Selection tree resolution
//!
//! Walks the operation's selection set against an in-memory result, starting
//! from a `null` root. Fields tagged `@rest` fetch their value over HTTP; every
//! other field reads from the value its parent resolved to. Sibling fields are
//! resolved concurrently and reassembled in selection order.

use crate::directives::{export_name, FieldKind};
use crate::document::{Field, FragmentMap, OperationKind, Selection, SelectionSet};
use crate::exports::ExportVariables;
use crate::http_executor;
use crate::link::LinkConfig;
use crate::transport::{RequestCredentials, RestResponse};
use crate::type_patcher::add_type_to_node;
use crate::{Error, Result};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use http::HeaderMap;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};

/// State shared by every field of one operation execution
pub(crate) struct ExecutionContext<'a> {
    pub config: &'a LinkConfig,
    pub operation: OperationKind,
    /// Link and context headers after the merge policy ran
    pub headers: HeaderMap,
    pub credentials: Option<RequestCredentials>,
    pub fragments: &'a FragmentMap,
    responses: Mutex<Vec<RestResponse>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        config: &'a LinkConfig,
        operation: OperationKind,
        headers: HeaderMap,
        credentials: Option<RequestCredentials>,
        fragments: &'a FragmentMap,
    ) -> Self {
        Self {
            config,
            operation,
            headers,
            credentials,
            fragments,
            responses: Mutex::new(Vec::new()),
        }
    }

    pub fn record_response(&self, response: RestResponse) {
        self.responses.lock().push(response);
    }

    /// Responses received so far, in completion order
    pub fn into_responses(self) -> Vec<RestResponse> {
        self.responses.into_inner()
    }
}

/// Resolve the root selection set of an operation
pub(crate) async fn execute_operation(
    ctx: &ExecutionContext<'_>,
    selection_set: &SelectionSet,
) -> Result<JsonValue> {
    let root = JsonValue::Null;
    let data = execute_selection_set(ctx, selection_set, &root, ExportVariables::new()).await?;
    Ok(JsonValue::Object(data))
}

fn execute_selection_set<'a>(
    ctx: &'a ExecutionContext<'a>,
    selection_set: &'a SelectionSet,
    root: &'a JsonValue,
    mut exports: ExportVariables,
) -> BoxFuture<'a, Result<Map<String, JsonValue>>> {
    async move {
        let mut fields = Vec::new();
        collect_fields(selection_set, ctx.fragments, &mut fields)?;

        // Exports are recorded in selection order before any field runs, so a
        // field sees the exports of the siblings declared before it.
        let mut scoped = Vec::with_capacity(fields.len());
        for &field in &fields {
            if let Some(name) = export_name(field)? {
                let value = root.get(&field.name).cloned().unwrap_or(JsonValue::Null);
                exports.record(name, value);
            }
            scoped.push((field, exports.clone()));
        }

        let values = try_join_all(
            scoped
                .into_iter()
                .map(|(field, exports)| execute_field(ctx, field, root, exports)),
        )
        .await?;

        let mut result = Map::new();
        for (field, value) in fields.into_iter().zip(values) {
            let Some(value) = value else { continue };
            match result.get_mut(field.result_key()) {
                Some(existing) => merge(existing, value),
                None => {
                    result.insert(field.result_key().to_string(), value);
                }
            }
        }
        Ok(result)
    }
    .boxed()
}

fn execute_field<'a>(
    ctx: &'a ExecutionContext<'a>,
    field: &'a Field,
    root: &'a JsonValue,
    exports: ExportVariables,
) -> BoxFuture<'a, Result<Option<JsonValue>>> {
    async move {
        let value = match FieldKind::classify(field)? {
            FieldKind::Leaf | FieldKind::PassThrough => read_field(root, field),
            FieldKind::TypeOnly(type_directive) => {
                if ctx.config.type_tagger.has_table() {
                    return Err(Error::configuration(format!(
                        "@type(name: \"{}\") on \"{}\" cannot be combined with a typePatcher table on the RestLink",
                        type_directive.name, field.name
                    )));
                }
                root.get(&field.name)
                    .cloned()
                    .map(|node| add_type_to_node(node, &type_directive.name))
            }
            FieldKind::RestCall(directive) => {
                Some(http_executor::execute(ctx, field, &directive, &exports).await?)
            }
        };

        let selection_set = match &field.selection_set {
            Some(selection_set) => selection_set,
            None => return Ok(value),
        };

        match value {
            None => Ok(None),
            Some(JsonValue::Null) => Ok(Some(JsonValue::Null)),
            Some(JsonValue::Array(items)) => {
                let items = execute_sub_selected_array(ctx, selection_set, &items, &exports).await?;
                Ok(Some(JsonValue::Array(items)))
            }
            Some(node) => {
                let object = execute_selection_set(ctx, selection_set, &node, exports).await?;
                Ok(Some(JsonValue::Object(object)))
            }
        }
    }
    .boxed()
}

fn execute_sub_selected_array<'a>(
    ctx: &'a ExecutionContext<'a>,
    selection_set: &'a SelectionSet,
    items: &'a [JsonValue],
    exports: &'a ExportVariables,
) -> BoxFuture<'a, Result<Vec<JsonValue>>> {
    async move {
        let elements = items.iter().map(move |item| async move {
            let value = match item {
                JsonValue::Null => JsonValue::Null,
                JsonValue::Array(nested) => JsonValue::Array(
                    execute_sub_selected_array(ctx, selection_set, nested, exports).await?,
                ),
                node => JsonValue::Object(
                    execute_selection_set(ctx, selection_set, node, exports.clone()).await?,
                ),
            };
            Ok::<_, Error>(value)
        });
        try_join_all(elements).await
    }
    .boxed()
}

/// The value of a field in its parent, preferring the aliased key
fn read_field(root: &JsonValue, field: &Field) -> Option<JsonValue> {
    root.get(field.result_key())
        .filter(|v| !v.is_null())
        .or_else(|| root.get(&field.name))
        .cloned()
}

/// Flatten fragments and drop skipped selections, keeping selection order
fn collect_fields<'a>(
    selection_set: &'a SelectionSet,
    fragments: &'a FragmentMap,
    out: &mut Vec<&'a Field>,
) -> Result<()> {
    for selection in &selection_set.items {
        if !selection.should_include() {
            continue;
        }
        match selection {
            Selection::Field(field) => out.push(field),
            Selection::InlineFragment { selection_set, .. } => {
                collect_fields(selection_set, fragments, out)?
            }
            Selection::FragmentSpread { name, .. } => {
                let fragment = fragments
                    .get(name)
                    .ok_or_else(|| Error::resolution(format!("No fragment named {}", name)))?;
                collect_fields(&fragment.selection_set, fragments, out)?;
            }
        }
    }
    Ok(())
}

/// Deep-merge `src` into `dest`; existing scalars win
fn merge(dest: &mut JsonValue, src: JsonValue) {
    match (dest, src) {
        (JsonValue::Object(dest), JsonValue::Object(src)) => {
            for (key, value) in src {
                match dest.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        dest.insert(key, value);
                    }
                }
            }
        }
        (JsonValue::Array(dest), JsonValue::Array(src)) => {
            for (index, value) in src.into_iter().enumerate() {
                match dest.get_mut(index) {
                    Some(existing) => merge(existing, value),
                    None => dest.push(value),
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_objects() {
        let mut dest = json!({"post": {"id": 1}, "a": 1});
        merge(&mut dest, json!({"post": {"title": "t"}, "a": 2, "b": 3}));
        assert_eq!(dest, json!({"post": {"id": 1, "title": "t"}, "a": 1, "b": 3}));
    }

    #[test]
    fn test_merge_arrays_elementwise() {
        let mut dest = json!([{"id": 1}, {"id": 2}]);
        merge(&mut dest, json!([{"title": "a"}, {"title": "b"}, {"title": "c"}]));
        assert_eq!(
            dest,
            json!([{"id": 1, "title": "a"}, {"id": 2, "title": "b"}, {"title": "c"}])
        );
    }

    #[test]
    fn test_read_field_prefers_alias() {
        let field = Field {
            alias: Some("short".to_string()),
            ..Field::leaf("title")
        };
        assert_eq!(
            read_field(&json!({"short": "s", "title": "t"}), &field),
            Some(json!("s"))
        );
        assert_eq!(read_field(&json!({"title": "t"}), &field), Some(json!("t")));
        assert_eq!(
            read_field(&json!({"short": null, "title": "t"}), &field),
            Some(json!("t"))
        );
        assert_eq!(read_field(&json!({}), &field), None);
        assert_eq!(read_field(&JsonValue::Null, &field), None);
    }
}
