//! Explicit nulls for omitted response fields
//!
//! REST endpoints routinely leave out optional fields. GraphQL results must
//! contain every selected field, so after a response is received the selection
//! set of the `@rest` field is walked alongside the response and missing keys
//! are filled with `null`.

use crate::document::{FragmentMap, Selection, SelectionSet, TYPENAME_FIELD};
use crate::{Error, Result};
use serde_json::{Map, Value as JsonValue};

/// Insert `null` for every selected field missing from `node`.
///
/// Arrays apply the selection set to each element. Fragments are applied to
/// the same node. Keys already present are never modified; nested objects are
/// visited only when the field has its own selection set.
pub fn insert_nulls_for_omitted_fields(
    node: &mut JsonValue,
    selection_set: &SelectionSet,
    fragments: &FragmentMap,
) -> Result<()> {
    match node {
        JsonValue::Array(items) => items
            .iter_mut()
            .try_for_each(|item| insert_nulls_for_omitted_fields(item, selection_set, fragments)),
        JsonValue::Object(map) => fill_object(map, selection_set, fragments),
        _ => Ok(()),
    }
}

fn fill_object(
    map: &mut Map<String, JsonValue>,
    selection_set: &SelectionSet,
    fragments: &FragmentMap,
) -> Result<()> {
    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) if field.name == TYPENAME_FIELD => {}
            Selection::Field(field) => match map.get_mut(&field.name) {
                None => {
                    map.insert(field.name.clone(), JsonValue::Null);
                }
                Some(value) => {
                    if let Some(nested) = &field.selection_set {
                        insert_nulls_for_omitted_fields(value, nested, fragments)?;
                    }
                }
            },
            Selection::InlineFragment { selection_set, .. } => {
                fill_object(map, selection_set, fragments)?;
            }
            Selection::FragmentSpread { name, .. } => {
                let fragment = fragments
                    .get(name)
                    .ok_or_else(|| Error::resolution(format!("No fragment named {}", name)))?;
                fill_object(map, &fragment.selection_set, fragments)?;
            }
        }
    }
    Ok(())
}
