//! REST calls for `@rest` fields
//!
//! Turns one `@rest` field into an HTTP request, issues it through the
//! configured [`Fetch`](crate::Fetch) and post-processes the response:
//! field names are normalized, omitted fields are filled with `null` and the
//! result is tagged with its type.

use crate::body_serializer::BodySerializer;
use crate::directives::{PathSource, RestDirective};
use crate::document::{Field, OperationKind};
use crate::endpoint::{DefaultTransformer, ResponseTransformer};
use crate::error::ServerError;
use crate::exports::ExportVariables;
use crate::headers::ensure_accept_header;
use crate::key_transform::convert_object_keys;
use crate::null_fill::insert_nulls_for_omitted_fields;
use crate::path_builder::{build_path, PathBuilderProps};
use crate::resolver::ExecutionContext;
use crate::transport::{HttpMethod, RestRequest};
use crate::type_patcher::TypePatcher;
use crate::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds a mutation body from the field arguments merged with exports,
/// referenced by name from `@rest(bodyBuilder:)`
pub trait BodyBuilder: Send + Sync {
    fn build(&self, args: &Map<String, JsonValue>) -> Result<JsonValue>;
}

impl<F> BodyBuilder for F
where
    F: Fn(&Map<String, JsonValue>) -> Result<JsonValue> + Send + Sync,
{
    fn build(&self, args: &Map<String, JsonValue>) -> Result<JsonValue> {
        self(args)
    }
}

/// Check that the HTTP method is allowed for the operation type
pub fn validate_request_method(method: &str, operation: OperationKind) -> Result<HttpMethod> {
    let parsed = HttpMethod::parse(method);
    match operation {
        OperationKind::Query => match parsed {
            Some(HttpMethod::GET) => Ok(HttpMethod::GET),
            _ => Err(Error::resolution(format!(
                "A \"query\" operation can only support \"GET\" requests but got \"{}\".",
                method
            ))),
        },
        OperationKind::Mutation => match parsed {
            Some(m @ (HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH | HttpMethod::DELETE)) => {
                Ok(m)
            }
            _ => Err(Error::resolution(
                "\"mutation\" operations do not support that HTTP-verb",
            )),
        },
        OperationKind::Subscription => Err(Error::resolution(
            "A \"subscription\" operation is not supported yet.",
        )),
    }
}

/// Resolve a `@rest` field with an HTTP call
#[instrument(skip_all, fields(field = %field.name, method = %directive.method))]
pub(crate) async fn execute(
    ctx: &ExecutionContext<'_>,
    field: &Field,
    directive: &RestDirective,
    exports: &ExportVariables,
) -> Result<JsonValue> {
    let config = ctx.config;
    let method = validate_request_method(&directive.method, ctx.operation)?;
    let endpoint = config.endpoints.resolve(directive.endpoint.as_deref())?;

    let args = exports.merge_with_args(&field.arguments);
    let props = PathBuilderProps {
        args: &args,
        export_variables: exports.read_all(),
    };

    let path = match directive.path_source()? {
        PathSource::Template(template) => build_path(template, &props)?,
        PathSource::Builder(name) => config
            .path_builders
            .get(name)
            .ok_or_else(|| unregistered("pathBuilder", name))?
            .build(&props)?,
    };

    let mut headers = ctx.headers.clone();
    ensure_accept_header(&mut headers);

    let mut body = None;
    if ctx.operation == OperationKind::Mutation && method.has_body() {
        let data = build_body(ctx, directive, method, &args)?;
        let serializer = body_serializer(ctx, directive)?;
        let serialized = serializer.serialize(&data, headers)?;
        headers = serialized.headers;
        body = Some(serialized.body);
    }

    let request = RestRequest {
        url: format!("{}{}", endpoint.uri(), path),
        method,
        headers,
        body,
        credentials: ctx.credentials,
    };

    debug!("REST {} {}", request.method, request.url);
    let response = config.fetch.fetch(request).await?;

    if response.is_error_status() {
        return Err(ServerError::new(response).into());
    }
    ctx.record_response(response.clone());

    let type_name = directive.type_name.as_deref().unwrap_or_default();
    let mut result = if response.is_empty_body() {
        JsonValue::Object(Map::new())
    } else {
        let transformer: &Arc<dyn ResponseTransformer> = endpoint
            .transformer()
            .unwrap_or(&config.response_transformer);
        transformer.transform(response, type_name).await?
    };

    if let Some(normalizer) = &config.field_name_normalizer {
        result = convert_object_keys(result, normalizer);
    }

    if let Some(selection_set) = &field.selection_set {
        insert_nulls_for_omitted_fields(&mut result, selection_set, ctx.fragments)?;
    }

    match &directive.type_name {
        Some(type_name) => {
            let root: Option<&dyn TypePatcher> = match &directive.type_patcher {
                Some(name) => Some(
                    config
                        .type_tagger
                        .patcher(name)
                        .ok_or_else(|| unregistered("typePatcher", name))?
                        .as_ref(),
                ),
                None => None,
            };
            config.type_tagger.tag_with(result, type_name, root)
        }
        None => Ok(result),
    }
}

fn build_body(
    ctx: &ExecutionContext<'_>,
    directive: &RestDirective,
    method: HttpMethod,
    args: &Map<String, JsonValue>,
) -> Result<JsonValue> {
    let config = ctx.config;
    let data = match &directive.body_builder {
        Some(name) => config
            .body_builders
            .get(name)
            .ok_or_else(|| unregistered("bodyBuilder", name))?
            .build(args)?,
        None => match args.get(directive.body_key()) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(Error::resolution(format!(
                    "[GraphQL {} mutation using a REST call without a body]. No `input` was detected. Pass bodyKey, or bodyBuilder to the @rest() directive to resolve this.",
                    method
                )))
            }
        },
    };

    let denormalizer = match &directive.field_name_denormalizer {
        Some(name) => Some(
            config
                .named_denormalizers
                .get(name)
                .ok_or_else(|| unregistered("fieldNameDenormalizer", name))?,
        ),
        None => config.field_name_denormalizer.as_ref(),
    };

    Ok(match denormalizer {
        Some(denormalizer) => convert_object_keys(data, denormalizer),
        None => data,
    })
}

fn body_serializer<'a>(
    ctx: &'a ExecutionContext<'_>,
    directive: &RestDirective,
) -> Result<&'a Arc<dyn BodySerializer>> {
    match &directive.body_serializer {
        Some(name) => ctx.config.body_serializers.get(name).ok_or_else(|| {
            Error::configuration(format!(
                "\"bodySerializer\" must correspond to configured serializer. Please make sure to specify a serializer called {} in the \"bodySerializers\" property of the RestLink.",
                name
            ))
        }),
        None => Ok(&ctx.config.default_serializer),
    }
}

fn unregistered(kind: &str, name: &str) -> Error {
    Error::configuration(format!(
        "@rest({}: \"{}\") does not match any {} registered on the RestLink",
        kind, name, kind
    ))
}

/// Transformer used when neither the link nor the endpoint configures one
pub(crate) fn default_transformer() -> Arc<dyn ResponseTransformer> {
    Arc::new(DefaultTransformer)
}
