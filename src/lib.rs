//! # graphql-rest-link
//!
//! Resolve GraphQL operations against REST endpoints, driven by directives in
//! the query document.
//!
//! ## Features
//!
//! - **`@rest` fields**: Any field can be fetched over HTTP, with path templates
//!   such as `/post/{args.id}` or `/search?{args}`
//! - **Exports**: `@export(as:)` makes a resolved value available to the paths
//!   and bodies of later REST calls
//! - **Type tagging**: Results are tagged with `__typename`, with optional
//!   per-type patchers for nested objects
//! - **Multiple endpoints**: Keyed endpoints with per-endpoint response
//!   transformers
//! - **Mutations**: JSON, form-urlencoded or custom body serializers and field
//!   name denormalization
//! - **Link chains**: Operations without `@rest` are forwarded to the next link
//!
//! ## Main Components
//!
//! - [`RestLink`]: Executes operations.
//! - [`RestLinkBuilder`]: Configuration builder for the link.
//! - [`Operation`] and [`OperationContext`]: The request and its per-operation
//!   headers, credentials and collected REST responses.
//! - [`Fetch`]: The HTTP transport, [`ReqwestFetch`] by default.
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use graphql_rest_link::{Operation, RestLink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let link = RestLink::builder()
//!         .uri("https://jsonplaceholder.typicode.com")
//!         .build()?;
//!
//!     let operation = Operation::new(
//!         r#"
//!         query {
//!             post @rest(type: "Post", path: "/posts/1") {
//!                 id @export(as: "postId")
//!                 title
//!                 comments @rest(type: "[Comment]", path: "/posts/{exportVariables.postId}/comments") {
//!                     body
//!                 }
//!             }
//!         }
//!         "#,
//!     )?;
//!
//!     let mut results = link.request(operation, None);
//!     while let Some(result) = results.next().await {
//!         println!("{}", serde_json::to_string_pretty(&result?)?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod body_serializer;
pub mod directives;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod exports;
pub mod headers;
pub mod http_executor;
pub mod key_transform;
pub mod link;
pub mod null_fill;
pub mod path_builder;
mod resolver;
pub mod transport;
pub mod type_patcher;

pub use body_serializer::{
    encode_json_as_form, BodySerializer, FormUrlEncodedSerializer, JsonBodySerializer,
    RawBodySerializer, SerializedBody,
};
pub use directives::{ExportDirective, FieldKind, RestDirective, TypeDirective};
pub use document::{OperationKind, QueryDocument};
pub use endpoint::{DefaultTransformer, Endpoint, Endpoints, ResponseTransformer};
pub use error::{Error, GraphQLError, Result, ServerError};
pub use exports::ExportVariables;
pub use headers::{ConcatHeadersMergePolicy, HeadersMergePolicy, OverrideHeadersMergePolicy};
pub use http_executor::{validate_request_method, BodyBuilder};
pub use key_transform::FieldNameNormalizer;
pub use link::{
    FetchResult, NextLink, Operation, OperationContext, ResultStream, RestLink, RestLinkBuilder,
};
pub use path_builder::{build_path, PathBuilder, PathBuilderProps};
pub use transport::{Fetch, HttpMethod, ReqwestFetch, RequestCredentials, RestRequest, RestResponse};
pub use type_patcher::{TypePatcher, TypeTagger};
