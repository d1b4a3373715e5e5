//! The REST link
//!
//! [`RestLink`] is the entry point of the crate. It receives an [`Operation`],
//! resolves every `@rest` field with an HTTP call and yields the assembled
//! result as a [`ResultStream`]. Operations without any `@rest` directive are
//! handed to the next link in the chain untouched.

use crate::body_serializer::{BodySerializer, JsonBodySerializer};
use crate::directives::REST_DIRECTIVE;
use crate::document::{document_has_directive, parse_document, QueryDocument};
use crate::endpoint::{Endpoint, Endpoints, ResponseTransformer, DEFAULT_ENDPOINT_KEY};
use crate::error::GraphQLError;
use crate::headers::{
    header_map, parse_header, ConcatHeadersMergePolicy, HeadersMergePolicy,
    OverrideHeadersMergePolicy,
};
use crate::http_executor::{default_transformer, BodyBuilder};
use crate::key_transform::FieldNameNormalizer;
use crate::path_builder::PathBuilder;
use crate::resolver::{execute_operation, ExecutionContext};
use crate::transport::{Fetch, ReqwestFetch, RequestCredentials, RestResponse};
use crate::type_patcher::{TypePatcher, TypePatcherTable, TypeTagger};
use crate::{Error, Result};
use async_graphql::parser::types::ExecutableDocument;
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt};
use http::HeaderMap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stream of results produced by a link
pub type ResultStream = BoxStream<'static, Result<FetchResult>>;

/// The result of one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
}

impl FetchResult {
    pub fn data(data: JsonValue) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }
}

/// The next link in a chain
pub trait NextLink: Send + Sync {
    fn forward(&self, operation: Operation) -> ResultStream;
}

impl<F> NextLink for F
where
    F: Fn(Operation) -> ResultStream + Send + Sync,
{
    fn forward(&self, operation: Operation) -> ResultStream {
        self(operation)
    }
}

/// Per-operation context shared with the rest of the link chain
#[derive(Default)]
pub struct OperationContext {
    /// Headers sent with every REST call of the operation
    pub headers: HeaderMap,

    /// Overrides the link credentials
    pub credentials: Option<RequestCredentials>,

    /// Decides how context headers combine with the link headers
    pub headers_merge_policy: Option<Arc<dyn HeadersMergePolicy>>,

    /// Link headers replaced by the context headers of the same name
    pub headers_to_override: Option<Vec<String>>,

    /// Responses of the REST calls made for this operation
    pub rest_responses: Vec<RestResponse>,

    /// Additional data for other links in the chain
    pub extensions: HashMap<String, JsonValue>,
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("headers", &self.headers)
            .field("credentials", &self.credentials)
            .field("has_merge_policy", &self.headers_merge_policy.is_some())
            .field("headers_to_override", &self.headers_to_override)
            .field("rest_responses", &self.rest_responses.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, validating name and value
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Insert extension data
    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) {
        self.extensions.insert(key.into(), value);
    }

    /// Get extension data
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.extensions.get(key)
    }

    /// Get typed extension data
    pub fn get_typed<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extensions
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn merge_policy(&self) -> Arc<dyn HeadersMergePolicy> {
        match (&self.headers_merge_policy, &self.headers_to_override) {
            (Some(policy), _) => policy.clone(),
            (None, Some(names)) => {
                Arc::new(OverrideHeadersMergePolicy::new().override_many(names.iter().cloned()))
            }
            (None, None) => Arc::new(ConcatHeadersMergePolicy),
        }
    }
}

/// A GraphQL operation travelling through the link chain
///
/// Clones share the same [`OperationContext`].
#[derive(Debug, Clone)]
pub struct Operation {
    document: Arc<ExecutableDocument>,
    variables: Map<String, JsonValue>,
    operation_name: Option<String>,
    context: Arc<Mutex<OperationContext>>,
}

impl Operation {
    /// Parse a query string into an operation
    pub fn new(query: &str) -> Result<Self> {
        Ok(Self::from_document(parse_document(query)?))
    }

    pub fn from_document(document: ExecutableDocument) -> Self {
        Self {
            document: Arc::new(document),
            variables: Map::new(),
            operation_name: None,
            context: Arc::new(Mutex::new(OperationContext::default())),
        }
    }

    pub fn variables(mut self, variables: Map<String, JsonValue>) -> Self {
        self.variables = variables;
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Select the operation to run in a document with several
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_context(self, context: OperationContext) -> Self {
        *self.context.lock() = context;
        self
    }

    pub fn document(&self) -> &ExecutableDocument {
        &self.document
    }

    pub fn get_variables(&self) -> &Map<String, JsonValue> {
        &self.variables
    }

    pub fn get_operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Lock the shared context
    pub fn get_context(&self) -> MutexGuard<'_, OperationContext> {
        self.context.lock()
    }

    pub fn set_context(&self, update: impl FnOnce(&mut OperationContext)) {
        update(&mut self.context.lock());
    }

    fn query_document(&self) -> Result<QueryDocument> {
        QueryDocument::from_executable(
            &self.document,
            self.operation_name.as_deref(),
            &self.variables,
        )
    }
}

/// Immutable link configuration shared by every execution
pub(crate) struct LinkConfig {
    pub endpoints: Endpoints,
    pub headers: HeaderMap,
    pub credentials: Option<RequestCredentials>,
    pub fetch: Arc<dyn Fetch>,
    pub field_name_normalizer: Option<FieldNameNormalizer>,
    pub field_name_denormalizer: Option<FieldNameNormalizer>,
    pub named_denormalizers: HashMap<String, FieldNameNormalizer>,
    pub type_tagger: TypeTagger,
    pub body_serializers: HashMap<String, Arc<dyn BodySerializer>>,
    pub default_serializer: Arc<dyn BodySerializer>,
    pub path_builders: HashMap<String, Arc<dyn PathBuilder>>,
    pub body_builders: HashMap<String, Arc<dyn BodyBuilder>>,
    pub response_transformer: Arc<dyn ResponseTransformer>,
}

/// Resolves `@rest` fields of GraphQL operations against REST endpoints
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use graphql_rest_link::{Operation, RestLink};
///
/// # async fn example() -> graphql_rest_link::Result<()> {
/// let link = RestLink::builder()
///     .uri("https://api.example.com")
///     .default_header("authorization", "Bearer token")
///     .build()?;
///
/// let operation = Operation::new(
///     r#"query { post @rest(type: "Post", path: "/post/1") { id title } }"#,
/// )?;
///
/// let mut results = link.request(operation, None);
/// while let Some(result) = results.next().await {
///     println!("{:?}", result?.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestLink {
    config: Arc<LinkConfig>,
}

impl std::fmt::Debug for RestLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestLink")
            .field("endpoints", &self.config.endpoints)
            .field("headers", &self.config.headers)
            .field("credentials", &self.config.credentials)
            .finish()
    }
}

impl RestLink {
    pub fn builder() -> RestLinkBuilder {
        RestLinkBuilder::new()
    }

    /// Handle an operation, forwarding it when it has no `@rest` field
    pub fn request(&self, operation: Operation, forward: Option<&dyn NextLink>) -> ResultStream {
        if !document_has_directive(operation.document(), REST_DIRECTIVE) {
            return match forward {
                Some(next) => {
                    debug!("Operation has no @rest directive, forwarding to the next link");
                    next.forward(operation)
                }
                None => stream::once(future::ready(Err(Error::configuration(
                    "Operation has no @rest directive and RestLink has no next link to forward it to",
                ))))
                .boxed(),
            };
        }

        let document = match operation.query_document() {
            Ok(document) => document,
            Err(err) => return stream::once(future::ready(Err(err))).boxed(),
        };

        let link = self.clone();
        stream::once(async move { link.execute_document(&operation, document).await })
            .flat_map(|outcome| stream::iter(into_results(outcome)))
            .boxed()
    }

    /// Resolve an operation and return its result directly
    pub async fn execute(&self, operation: &Operation) -> Result<FetchResult> {
        let document = operation.query_document()?;
        self.execute_document(operation, document).await
    }

    #[instrument(skip_all, fields(operation = %document.operation, name = ?document.operation_name))]
    async fn execute_document(
        &self,
        operation: &Operation,
        document: QueryDocument,
    ) -> Result<FetchResult> {
        let (headers, credentials) = {
            let context = operation.get_context();
            let headers = context
                .merge_policy()
                .merge(&self.config.headers, &context.headers);
            (headers, context.credentials.or(self.config.credentials))
        };

        let ctx = ExecutionContext::new(
            &self.config,
            document.operation,
            headers,
            credentials,
            &document.fragments,
        );
        let result = execute_operation(&ctx, &document.selection_set).await;

        let responses = ctx.into_responses();
        operation.set_context(|context| context.rest_responses.extend(responses));

        Ok(FetchResult::data(result?))
    }
}

fn into_results(outcome: Result<FetchResult>) -> Vec<Result<FetchResult>> {
    match outcome {
        Ok(result) => vec![Ok(result)],
        Err(Error::Aborted) => {
            debug!("REST request aborted");
            Vec::new()
        }
        Err(err) => match err.partial_result().cloned() {
            Some(partial) => vec![Ok(partial), Err(err)],
            None => vec![Err(err)],
        },
    }
}

/// Builder for [`RestLink`]
pub struct RestLinkBuilder {
    uri: Option<String>,
    endpoints: Option<Endpoints>,
    headers: Vec<(String, String)>,
    credentials: Option<RequestCredentials>,
    fetch: Option<Arc<dyn Fetch>>,
    field_name_normalizer: Option<FieldNameNormalizer>,
    field_name_denormalizer: Option<FieldNameNormalizer>,
    named_denormalizers: HashMap<String, FieldNameNormalizer>,
    type_patchers: TypePatcherTable,
    body_serializers: HashMap<String, Arc<dyn BodySerializer>>,
    default_serializer: Option<Arc<dyn BodySerializer>>,
    path_builders: HashMap<String, Arc<dyn PathBuilder>>,
    body_builders: HashMap<String, Arc<dyn BodyBuilder>>,
    response_transformer: Option<Arc<dyn ResponseTransformer>>,
}

impl Default for RestLinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RestLinkBuilder {
    pub fn new() -> Self {
        Self {
            uri: None,
            endpoints: None,
            headers: Vec::new(),
            credentials: None,
            fetch: None,
            field_name_normalizer: None,
            field_name_denormalizer: None,
            named_denormalizers: HashMap::new(),
            type_patchers: TypePatcherTable::new(),
            body_serializers: HashMap::new(),
            default_serializer: None,
            path_builders: HashMap::new(),
            body_builders: HashMap::new(),
            response_transformer: None,
        }
    }

    /// Default endpoint URI
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Register a keyed endpoint
    pub fn endpoint(mut self, key: impl Into<String>, endpoint: impl Into<Endpoint>) -> Self {
        self.endpoints
            .get_or_insert_with(Endpoints::new)
            .insert(key, endpoint);
        self
    }

    /// Replace all keyed endpoints
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Add a header sent with every request. Repeated names are kept.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn credentials(mut self, credentials: RequestCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use a custom transport instead of [`ReqwestFetch`]
    pub fn custom_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Rename response keys before they reach the selection set
    pub fn field_name_normalizer(mut self, normalizer: FieldNameNormalizer) -> Self {
        self.field_name_normalizer = Some(normalizer);
        self
    }

    /// Rename request body keys before serialization
    pub fn field_name_denormalizer(mut self, denormalizer: FieldNameNormalizer) -> Self {
        self.field_name_denormalizer = Some(denormalizer);
        self
    }

    /// Register a denormalizer for `@rest(fieldNameDenormalizer:)`
    pub fn named_field_name_denormalizer(
        mut self,
        name: impl Into<String>,
        denormalizer: FieldNameNormalizer,
    ) -> Self {
        self.named_denormalizers.insert(name.into(), denormalizer);
        self
    }

    /// Register a patcher for a type name
    pub fn type_patcher(mut self, type_name: impl Into<String>, patcher: Arc<dyn TypePatcher>) -> Self {
        self.type_patchers.insert(type_name.into(), patcher);
        self
    }

    /// Register a serializer for `@rest(bodySerializer:)`
    pub fn body_serializer(mut self, name: impl Into<String>, serializer: Arc<dyn BodySerializer>) -> Self {
        self.body_serializers.insert(name.into(), serializer);
        self
    }

    /// Serializer used when a field names none, JSON by default
    pub fn default_serializer(mut self, serializer: Arc<dyn BodySerializer>) -> Self {
        self.default_serializer = Some(serializer);
        self
    }

    /// Turns every response into JSON unless the endpoint has its own
    pub fn response_transformer(mut self, transformer: Arc<dyn ResponseTransformer>) -> Self {
        self.response_transformer = Some(transformer);
        self
    }

    /// Register a builder for `@rest(pathBuilder:)`
    pub fn path_builder(mut self, name: impl Into<String>, builder: Arc<dyn PathBuilder>) -> Self {
        self.path_builders.insert(name.into(), builder);
        self
    }

    /// Register a builder for `@rest(bodyBuilder:)`
    pub fn body_builder(mut self, name: impl Into<String>, builder: Arc<dyn BodyBuilder>) -> Self {
        self.body_builders.insert(name.into(), builder);
        self
    }

    /// Validate the configuration and build the link
    pub fn build(self) -> Result<RestLink> {
        if self.uri.is_none() && self.endpoints.is_none() {
            return Err(Error::configuration(
                "A RestLink must be initialized with either 1 uri, or a map of keyed-endpoints",
            ));
        }

        let mut endpoints = self.endpoints.unwrap_or_default();
        if let Some(uri) = self.uri {
            let existing = endpoints.default_endpoint().map(|e| e.uri().to_string());
            match existing {
                Some(existing) if existing != uri => {
                    return Err(Error::configuration(
                        "RestLink was configured with a default uri that doesn't match what's passed in to the endpoints map.",
                    ));
                }
                Some(_) => {}
                None => endpoints.insert(DEFAULT_ENDPOINT_KEY, uri),
            }
        }

        if endpoints.default_endpoint().is_none() {
            warn!("RestLink configured without a default URI. All @rest(…) directives must provide an endpoint key!");
        }

        let headers = header_map(self.headers)?;

        info!(
            endpoints = endpoints.len(),
            type_patchers = self.type_patchers.len(),
            "RestLink configured"
        );

        let config = LinkConfig {
            endpoints,
            headers,
            credentials: self.credentials,
            fetch: self.fetch.unwrap_or_else(|| Arc::new(ReqwestFetch::new())),
            field_name_normalizer: self.field_name_normalizer,
            field_name_denormalizer: self.field_name_denormalizer,
            named_denormalizers: self.named_denormalizers,
            type_tagger: TypeTagger::new(self.type_patchers),
            body_serializers: self.body_serializers,
            default_serializer: self
                .default_serializer
                .unwrap_or_else(|| Arc::new(JsonBodySerializer)),
            path_builders: self.path_builders,
            body_builders: self.body_builders,
            response_transformer: self
                .response_transformer
                .unwrap_or_else(default_transformer),
        };

        Ok(RestLink {
            config: Arc::new(config),
        })
    }
}
