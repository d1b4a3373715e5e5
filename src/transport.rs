//! HTTP transport
//!
//! The link never talks to the network directly. Requests go through a
//! [`Fetch`] implementation: [`ReqwestFetch`] by default, or any custom
//! implementation handed to [`RestLinkBuilder::custom_fetch`](crate::RestLinkBuilder::custom_fetch),
//! which is how tests and embedders intercept traffic.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, error};

/// HTTP methods supported by `@rest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl HttpMethod {
    /// Parse a method name, ignoring case
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            _ => None,
        }
    }

    /// Whether requests with this method carry a body
    pub fn has_body(&self) -> bool {
        !matches!(self, HttpMethod::GET | HttpMethod::DELETE)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::GET => write!(f, "GET"),
            HttpMethod::POST => write!(f, "POST"),
            HttpMethod::PUT => write!(f, "PUT"),
            HttpMethod::PATCH => write!(f, "PATCH"),
            HttpMethod::DELETE => write!(f, "DELETE"),
        }
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => http::Method::GET,
            HttpMethod::POST => http::Method::POST,
            HttpMethod::PUT => http::Method::PUT,
            HttpMethod::PATCH => http::Method::PATCH,
            HttpMethod::DELETE => http::Method::DELETE,
        }
    }
}

/// Credentials policy forwarded to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCredentials {
    Omit,
    SameOrigin,
    Include,
}

impl std::fmt::Display for RequestCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestCredentials::Omit => write!(f, "omit"),
            RequestCredentials::SameOrigin => write!(f, "same-origin"),
            RequestCredentials::Include => write!(f, "include"),
        }
    }
}

/// Represents a REST request to be made
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// Full URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers, repeated names allowed
    pub headers: HeaderMap,
    /// Serialized body (mutations only)
    pub body: Option<Bytes>,
    /// Credentials policy
    pub credentials: Option<RequestCredentials>,
}

/// Raw response of a REST call
#[derive(Debug, Clone)]
pub struct RestResponse {
    /// Final URL of the request
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl RestResponse {
    /// Whether the status is treated as a server error (anything from 300 up)
    pub fn is_error_status(&self) -> bool {
        self.status >= 300
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the response declares an empty body (`204` or `Content-Length: 0`)
    pub fn is_empty_body(&self) -> bool {
        self.status == 204 || self.header("content-length") == Some("0")
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<JsonValue> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs REST requests
///
/// Implementations report a cancelled request with [`Error::Aborted`]; the
/// link swallows that error instead of surfacing it.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: RestRequest) -> Result<RestResponse>;
}

/// Default transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl Default for ReqwestFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Use a preconfigured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Set a per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: RestRequest) -> Result<RestResponse> {
        let start = std::time::Instant::now();

        let mut req_builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = self.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await.map_err(|e| {
            error!("REST request failed: {}", e);
            Error::Transport(e.to_string())
        })?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read REST response: {}", e);
            Error::Transport(format!("Failed to read REST response: {}", e))
        })?;

        debug!(
            "REST {} {} -> {} ({:?})",
            request.method,
            url,
            status,
            start.elapsed()
        );

        Ok(RestResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_LENGTH;
    use serde_json::json;

    fn response(status: u16, body: &'static str) -> RestResponse {
        RestResponse {
            url: "https://api.example.com".to_string(),
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::GET.to_string(), "GET");
        assert_eq!(HttpMethod::POST.to_string(), "POST");
        assert_eq!(HttpMethod::PUT.to_string(), "PUT");
        assert_eq!(HttpMethod::PATCH.to_string(), "PATCH");
        assert_eq!(HttpMethod::DELETE.to_string(), "DELETE");
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::parse("Patch"), Some(HttpMethod::PATCH));
        assert_eq!(HttpMethod::parse("OPTIONS"), None);
    }

    #[test]
    fn test_http_method_has_body() {
        assert!(!HttpMethod::GET.has_body());
        assert!(!HttpMethod::DELETE.has_body());
        assert!(HttpMethod::POST.has_body());
        assert!(HttpMethod::PUT.has_body());
        assert!(HttpMethod::PATCH.has_body());
    }

    #[test]
    fn test_http_method_serde() {
        assert_eq!(serde_json::to_value(HttpMethod::PATCH).unwrap(), json!("PATCH"));
        let method: HttpMethod = serde_json::from_value(json!("DELETE")).unwrap();
        assert_eq!(method, HttpMethod::DELETE);
    }

    #[test]
    fn test_credentials_serde() {
        assert_eq!(
            serde_json::to_value(RequestCredentials::SameOrigin).unwrap(),
            json!("same-origin")
        );
        assert_eq!(RequestCredentials::Include.to_string(), "include");
    }

    #[test]
    fn test_response_error_status() {
        assert!(!response(200, "").is_error_status());
        assert!(!response(204, "").is_error_status());
        assert!(response(300, "").is_error_status());
        assert!(response(301, "").is_error_status());
        assert!(response(404, "").is_error_status());
    }

    #[test]
    fn test_response_empty_body() {
        assert!(response(204, "").is_empty_body());

        let mut with_length = response(200, "");
        with_length.headers.insert(CONTENT_LENGTH, "0".parse().unwrap());
        assert!(with_length.is_empty_body());

        assert!(!response(200, "{}").is_empty_body());
    }

    #[test]
    fn test_response_json_and_text() {
        let res = response(200, r#"{"id": 1}"#);
        assert_eq!(res.json().unwrap(), json!({"id": 1}));
        assert_eq!(res.text(), r#"{"id": 1}"#);

        assert!(response(200, "not json").json().is_err());
    }
}
