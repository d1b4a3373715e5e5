//! Query document model
//!
//! Operations arrive as async-graphql [`ExecutableDocument`]s. Before execution
//! the selected operation is converted once into the owned tree defined here:
//! arguments and directive arguments are resolved against the operation
//! variables into JSON, fragment definitions are collected into a
//! [`FragmentMap`], and every non-root selection set gains an implicit
//! `__typename` selection.

use crate::{Error, Result};
use async_graphql::parser::types::{
    DocumentOperations, ExecutableDocument, OperationDefinition, OperationType,
    Selection as GqlSelection, SelectionSet as GqlSelectionSet,
};
use async_graphql::parser::Positioned;
use async_graphql_value::{ConstValue, Name, Value as GqlValue};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// The field name used for type tags
pub const TYPENAME_FIELD: &str = "__typename";

/// Root operation type of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// A directive with its arguments resolved to JSON
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Map<String, JsonValue>,
}

impl Directive {
    /// Get an argument by name
    pub fn argument(&self, name: &str) -> Option<&JsonValue> {
        self.arguments.get(name)
    }
}

/// A selected field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Map<String, JsonValue>,
    pub directives: Vec<Directive>,
    /// `None` marks a leaf
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// Create a leaf field without arguments or directives
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: Map::new(),
            directives: Vec::new(),
            selection_set: None,
        }
    }

    /// Key under which this field appears in the result
    pub fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.selection_set.is_none()
    }

    /// Find a directive by name
    pub fn directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }
}

/// One entry of a selection set
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    FragmentSpread {
        name: String,
        directives: Vec<Directive>,
    },
    InlineFragment {
        type_condition: Option<String>,
        directives: Vec<Directive>,
        selection_set: SelectionSet,
    },
}

impl Selection {
    pub fn directives(&self) -> &[Directive] {
        match self {
            Selection::Field(field) => &field.directives,
            Selection::FragmentSpread { directives, .. } => directives,
            Selection::InlineFragment { directives, .. } => directives,
        }
    }

    /// Evaluate `@skip(if:)` and `@include(if:)`
    pub fn should_include(&self) -> bool {
        let mut include = true;
        for directive in self.directives() {
            let condition = directive.argument("if").and_then(JsonValue::as_bool);
            match (directive.name.as_str(), condition) {
                ("skip", Some(true)) => include = false,
                ("include", Some(false)) => include = false,
                _ => {}
            }
        }
        include
    }
}

/// An ordered list of selections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

impl SelectionSet {
    pub fn new(items: Vec<Selection>) -> Self {
        Self { items }
    }

    fn has_typename(&self) -> bool {
        self.items
            .iter()
            .any(|s| matches!(s, Selection::Field(f) if f.name == TYPENAME_FIELD))
    }
}

/// A named fragment definition
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub type_condition: String,
    pub selection_set: SelectionSet,
}

/// Fragment definitions keyed by name
pub type FragmentMap = HashMap<String, Fragment>;

/// The operation selected for execution, ready for the resolver
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    pub operation: OperationKind,
    pub operation_name: Option<String>,
    pub selection_set: SelectionSet,
    pub fragments: FragmentMap,
}

impl QueryDocument {
    /// Parse a query string and prepare the selected operation
    pub fn parse(
        query: &str,
        operation_name: Option<&str>,
        variables: &Map<String, JsonValue>,
    ) -> Result<Self> {
        let document = parse_document(query)?;
        Self::from_executable(&document, operation_name, variables)
    }

    /// Convert the selected operation of a parsed document
    pub fn from_executable(
        document: &ExecutableDocument,
        operation_name: Option<&str>,
        variables: &Map<String, JsonValue>,
    ) -> Result<Self> {
        let (name, operation) = select_operation(document, operation_name)?;
        let converter = DocumentConverter::new(&operation.node, variables)?;

        let selection_set =
            converter.convert_selection_set(&operation.node.selection_set.node, false)?;

        let mut fragments = FragmentMap::new();
        for (fragment_name, definition) in &document.fragments {
            let fragment = Fragment {
                type_condition: definition
                    .node
                    .type_condition
                    .node
                    .on
                    .node
                    .to_string(),
                selection_set: converter
                    .convert_selection_set(&definition.node.selection_set.node, true)?,
            };
            fragments.insert(fragment_name.to_string(), fragment);
        }

        Ok(Self {
            operation: operation.node.ty.into(),
            operation_name: name,
            selection_set,
            fragments,
        })
    }
}

/// Parse a GraphQL query string
pub fn parse_document(query: &str) -> Result<ExecutableDocument> {
    async_graphql::parser::parse_query(query).map_err(|e| Error::Document(e.to_string()))
}

fn select_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<(Option<String>, &'a Positioned<OperationDefinition>)> {
    match &document.operations {
        DocumentOperations::Single(operation) => Ok((None, operation)),
        DocumentOperations::Multiple(operations) => match operation_name {
            Some(name) => operations
                .get(name)
                .map(|op| (Some(name.to_string()), op))
                .ok_or_else(|| Error::Document(format!("Unknown operation named \"{}\"", name))),
            None if operations.len() == 1 => operations
                .iter()
                .next()
                .map(|(name, op)| (Some(name.to_string()), op))
                .ok_or_else(|| Error::Document("Document contains no operation".to_string())),
            None => Err(Error::Document(
                "Operation name required in request".to_string(),
            )),
        },
    }
}

/// Check whether any field of any operation or fragment in the raw document
/// carries the directive
///
/// Runs before operation selection and variable coercion, so it never fails.
pub fn document_has_directive(document: &ExecutableDocument, name: &str) -> bool {
    let in_operations = match &document.operations {
        DocumentOperations::Single(operation) => {
            gql_selection_set_has_directive(&operation.node.selection_set.node, name)
        }
        DocumentOperations::Multiple(operations) => operations
            .values()
            .any(|op| gql_selection_set_has_directive(&op.node.selection_set.node, name)),
    };

    in_operations
        || document
            .fragments
            .values()
            .any(|f| gql_selection_set_has_directive(&f.node.selection_set.node, name))
}

fn gql_selection_set_has_directive(selection_set: &GqlSelectionSet, name: &str) -> bool {
    selection_set.items.iter().any(|selection| match &selection.node {
        GqlSelection::Field(field) => {
            field
                .node
                .directives
                .iter()
                .any(|d| d.node.name.node.as_str() == name)
                || gql_selection_set_has_directive(&field.node.selection_set.node, name)
        }
        GqlSelection::FragmentSpread(_) => false,
        GqlSelection::InlineFragment(fragment) => {
            gql_selection_set_has_directive(&fragment.node.selection_set.node, name)
        }
    })
}

/// Converts async-graphql AST nodes into the owned document model
struct DocumentConverter {
    variables: HashMap<String, ConstValue>,
}

impl DocumentConverter {
    fn new(operation: &OperationDefinition, provided: &Map<String, JsonValue>) -> Result<Self> {
        let mut variables = HashMap::new();
        for definition in &operation.variable_definitions {
            let name = definition.node.name.node.to_string();
            let value = match provided.get(&name) {
                Some(value) => ConstValue::from_json(value.clone()).map_err(|e| {
                    Error::Document(format!("Invalid value for variable \"{}\": {}", name, e))
                })?,
                None => definition
                    .node
                    .default_value
                    .as_ref()
                    .map(|v| v.node.clone())
                    .unwrap_or(ConstValue::Null),
            };
            variables.insert(name, value);
        }
        // Undeclared variables are still visible to directives
        for (name, value) in provided {
            if !variables.contains_key(name) {
                let value = ConstValue::from_json(value.clone()).map_err(|e| {
                    Error::Document(format!("Invalid value for variable \"{}\": {}", name, e))
                })?;
                variables.insert(name.clone(), value);
            }
        }
        Ok(Self { variables })
    }

    fn convert_selection_set(
        &self,
        selection_set: &GqlSelectionSet,
        add_typename: bool,
    ) -> Result<SelectionSet> {
        let mut items = Vec::with_capacity(selection_set.items.len() + 1);
        for selection in &selection_set.items {
            items.push(self.convert_selection(&selection.node)?);
        }
        let mut converted = SelectionSet::new(items);
        if add_typename && !converted.has_typename() {
            converted
                .items
                .push(Selection::Field(Field::leaf(TYPENAME_FIELD)));
        }
        Ok(converted)
    }

    fn convert_selection(&self, selection: &GqlSelection) -> Result<Selection> {
        match selection {
            GqlSelection::Field(field) => {
                let field = &field.node;
                let directives = self.convert_directives(&field.directives)?;
                // Exported object values are used as inputs, so they stay untagged
                let exported = directives.iter().any(|d| d.name == "export");
                let selection_set = if field.selection_set.node.items.is_empty() {
                    None
                } else {
                    Some(self.convert_selection_set(&field.selection_set.node, !exported)?)
                };
                Ok(Selection::Field(Field {
                    name: field.name.node.to_string(),
                    alias: field.alias.as_ref().map(|a| a.node.to_string()),
                    arguments: self.convert_arguments(&field.arguments)?,
                    directives,
                    selection_set,
                }))
            }
            GqlSelection::FragmentSpread(spread) => Ok(Selection::FragmentSpread {
                name: spread.node.fragment_name.node.to_string(),
                directives: self.convert_directives(&spread.node.directives)?,
            }),
            GqlSelection::InlineFragment(fragment) => Ok(Selection::InlineFragment {
                type_condition: fragment
                    .node
                    .type_condition
                    .as_ref()
                    .map(|tc| tc.node.on.node.to_string()),
                directives: self.convert_directives(&fragment.node.directives)?,
                selection_set: self.convert_selection_set(&fragment.node.selection_set.node, true)?,
            }),
        }
    }

    fn convert_directives(
        &self,
        directives: &[Positioned<async_graphql::parser::types::Directive>],
    ) -> Result<Vec<Directive>> {
        directives
            .iter()
            .map(|directive| {
                Ok(Directive {
                    name: directive.node.name.node.to_string(),
                    arguments: self.convert_arguments(&directive.node.arguments)?,
                })
            })
            .collect()
    }

    fn convert_arguments(
        &self,
        arguments: &[(Positioned<Name>, Positioned<GqlValue>)],
    ) -> Result<Map<String, JsonValue>> {
        let mut map = Map::new();
        for (name, value) in arguments {
            let value = value.node.clone().into_const_with(|variable: Name| {
                Ok::<_, Error>(
                    self.variables
                        .get(variable.as_str())
                        .cloned()
                        .unwrap_or(ConstValue::Null),
                )
            })?;
            map.insert(name.node.to_string(), value.into_json()?);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn first_field(doc: &QueryDocument) -> &Field {
        match &doc.selection_set.items[0] {
            Selection::Field(field) => field,
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_query() {
        let doc = QueryDocument::parse(
            r#"query postTitle { post @rest(type: "Post", path: "/post/1") { id title } }"#,
            None,
            &Map::new(),
        )
        .unwrap();

        assert_eq!(doc.operation, OperationKind::Query);
        assert_eq!(doc.operation_name.as_deref(), Some("postTitle"));

        let post = first_field(&doc);
        assert_eq!(post.name, "post");
        let rest = post.directive("rest").unwrap();
        assert_eq!(rest.argument("type"), Some(&json!("Post")));
        assert_eq!(rest.argument("path"), Some(&json!("/post/1")));
    }

    #[test]
    fn test_typename_added_to_nested_selection_sets_only() {
        let doc = QueryDocument::parse(
            r#"{ post @rest(type: "Post", path: "/post/1") { id } }"#,
            None,
            &Map::new(),
        )
        .unwrap();

        assert_eq!(doc.selection_set.items.len(), 1);
        let names: Vec<_> = first_field(&doc)
            .selection_set
            .as_ref()
            .unwrap()
            .items
            .iter()
            .filter_map(|s| match s {
                Selection::Field(f) => Some(f.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["id", "__typename"]);
    }

    #[test]
    fn test_typename_not_duplicated() {
        let doc = QueryDocument::parse(
            r#"{ post @rest(type: "Post", path: "/post/1") { __typename id } }"#,
            None,
            &Map::new(),
        )
        .unwrap();
        let items = &first_field(&doc).selection_set.as_ref().unwrap().items;
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_other_double_underscore_fields_still_get_typename() {
        let doc = QueryDocument::parse(
            r#"{ post @rest(type: "Post", path: "/post/1") { __schema id } }"#,
            None,
            &Map::new(),
        )
        .unwrap();
        let names: Vec<_> = first_field(&doc)
            .selection_set
            .as_ref()
            .unwrap()
            .items
            .iter()
            .filter_map(|s| match s {
                Selection::Field(f) => Some(f.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["__schema", "id", "__typename"]);
    }

    #[test]
    fn test_variables_resolved_in_arguments_and_directives() {
        let doc = QueryDocument::parse(
            r#"query ($id: ID!, $path: String = "/default") {
                post(id: $id) @rest(type: "Post", path: $path) { id }
            }"#,
            None,
            &vars(json!({"id": "42"})),
        )
        .unwrap();

        let post = first_field(&doc);
        assert_eq!(post.arguments.get("id"), Some(&json!("42")));
        assert_eq!(
            post.directive("rest").unwrap().argument("path"),
            Some(&json!("/default"))
        );
    }

    #[test]
    fn test_alias_and_result_key() {
        let doc = QueryDocument::parse(
            r#"{ first: post @rest(type: "Post", path: "/post/1") { id } }"#,
            None,
            &Map::new(),
        )
        .unwrap();
        let post = first_field(&doc);
        assert_eq!(post.name, "post");
        assert_eq!(post.result_key(), "first");
    }

    #[test]
    fn test_fragments_collected() {
        let doc = QueryDocument::parse(
            r#"
            query { post @rest(type: "Post", path: "/post/1") { ...PostParts } }
            fragment PostParts on Post { id title }
            "#,
            None,
            &Map::new(),
        )
        .unwrap();
        let fragment = doc.fragments.get("PostParts").unwrap();
        assert_eq!(fragment.type_condition, "Post");
        assert_eq!(fragment.selection_set.items.len(), 3);
    }

    #[test]
    fn test_mutation_kind() {
        let doc = QueryDocument::parse(
            r#"mutation { createPost(input: {title: "x"}) @rest(type: "Post", path: "/posts", method: "POST") { id } }"#,
            None,
            &Map::new(),
        )
        .unwrap();
        assert_eq!(doc.operation, OperationKind::Mutation);
        assert_eq!(
            first_field(&doc).arguments.get("input"),
            Some(&json!({"title": "x"}))
        );
    }

    #[test]
    fn test_operation_selection_by_name() {
        let query = r#"
            query A { a @rest(type: "A", path: "/a") { id } }
            query B { b @rest(type: "B", path: "/b") { id } }
        "#;
        let doc = QueryDocument::parse(query, Some("B"), &Map::new()).unwrap();
        assert_eq!(first_field(&doc).name, "b");

        let err = QueryDocument::parse(query, None, &Map::new()).unwrap_err();
        assert!(matches!(err, Error::Document(_)));

        let err = QueryDocument::parse(query, Some("C"), &Map::new()).unwrap_err();
        assert!(err.to_string().contains("Unknown operation"));
    }

    #[test]
    fn test_document_has_directive() {
        let doc = parse_document("{ hello }").unwrap();
        assert!(!document_has_directive(&doc, "rest"));

        let doc = parse_document(
            r#"
            query { ...Root }
            fragment Root on Query { post @rest(type: "Post", path: "/post/1") { id } }
            "#,
        )
        .unwrap();
        assert!(document_has_directive(&doc, "rest"));

        // Found in any operation, without picking one
        let doc = parse_document(
            r#"
            query A { a }
            query B { ... on Query { b @rest(type: "B", path: "/b") { id } } }
            "#,
        )
        .unwrap();
        assert!(document_has_directive(&doc, "rest"));
        assert!(!document_has_directive(&doc, "export"));
    }

    #[test]
    fn test_should_include() {
        let doc = QueryDocument::parse(
            r#"query ($skip: Boolean!) { a @skip(if: $skip) b @include(if: false) c }"#,
            None,
            &vars(json!({"skip": true})),
        )
        .unwrap();
        let included: Vec<bool> = doc
            .selection_set
            .items
            .iter()
            .map(Selection::should_include)
            .collect();
        assert_eq!(included, vec![false, false, true]);
    }

    #[test]
    fn test_parse_error() {
        let err = QueryDocument::parse("{ post ", None, &Map::new()).unwrap_err();
        assert!(matches!(err, Error::Document(_)));
    }
}
