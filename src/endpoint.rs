//! Endpoint map and response transformers
//!
//! A link may talk to several REST services. Each one is registered under an
//! endpoint key and selected with `@rest(endpoint: "key")`; fields without an
//! `endpoint` use the default key `""`.

use crate::transport::RestResponse;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Key of the endpoint used when `@rest` has no `endpoint` argument
pub const DEFAULT_ENDPOINT_KEY: &str = "";

/// Trait for custom REST response transformers
///
/// Turns a successful response into the JSON value handed to the resolver.
/// Receives the `@rest(type:)` name of the field being resolved.
#[async_trait]
pub trait ResponseTransformer: Send + Sync {
    async fn transform(&self, response: RestResponse, type_name: &str) -> Result<JsonValue>;
}

/// Default response transformer that parses the body as JSON
#[derive(Debug, Default)]
pub struct DefaultTransformer;

#[async_trait]
impl ResponseTransformer for DefaultTransformer {
    async fn transform(&self, response: RestResponse, _type_name: &str) -> Result<JsonValue> {
        response.json()
    }
}

/// A REST service the link can call
#[derive(Clone)]
pub struct Endpoint {
    uri: String,
    response_transformer: Option<Arc<dyn ResponseTransformer>>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("uri", &self.uri)
            .field("response_transformer", &self.response_transformer.is_some())
            .finish()
    }
}

impl Endpoint {
    /// Create an endpoint; paths are appended to `uri` as-is
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            response_transformer: None,
        }
    }

    /// Set a transformer used for responses of this endpoint only
    pub fn response_transformer(mut self, transformer: Arc<dyn ResponseTransformer>) -> Self {
        self.response_transformer = Some(transformer);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn transformer(&self) -> Option<&Arc<dyn ResponseTransformer>> {
        self.response_transformer.as_ref()
    }
}

impl From<&str> for Endpoint {
    fn from(uri: &str) -> Self {
        Endpoint::new(uri)
    }
}

impl From<String> for Endpoint {
    fn from(uri: String) -> Self {
        Endpoint::new(uri)
    }
}

/// Endpoints keyed by name
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    endpoints: HashMap<String, Endpoint>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint
    pub fn insert(&mut self, key: impl Into<String>, endpoint: impl Into<Endpoint>) {
        self.endpoints.insert(key.into(), endpoint.into());
    }

    /// Get an endpoint by key, without falling back to the default
    pub fn get(&self, key: &str) -> Option<&Endpoint> {
        self.endpoints.get(key)
    }

    /// The endpoint registered under the default key
    pub fn default_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.get(DEFAULT_ENDPOINT_KEY)
    }

    /// Find the endpoint for a `@rest` field, falling back to the default endpoint
    pub fn resolve(&self, key: Option<&str>) -> Result<&Endpoint> {
        let key = key.unwrap_or(DEFAULT_ENDPOINT_KEY);
        self.endpoints
            .get(key)
            .or_else(|| self.default_endpoint())
            .ok_or_else(|| {
                Error::resolution(format!(
                    "No endpoint registered under \"{}\" and RestLink has no default URI",
                    key
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Endpoints
where
    K: Into<String>,
    V: Into<Endpoint>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut endpoints = Endpoints::new();
        for (key, endpoint) in iter {
            endpoints.insert(key, endpoint);
        }
        endpoints
    }
}
