//! Error types for the REST link

use crate::link::FetchResult;
use crate::transport::RestResponse;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the link
///
/// Configuration errors are raised while building a link or while reading the
/// `@rest` directive of a field. Resolution errors are raised while turning a
/// field into an HTTP request. Neither is ever retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid link or directive configuration
    #[error("{0}")]
    Configuration(String),

    /// A field could not be turned into a REST request
    #[error("{0}")]
    Resolution(String),

    /// The REST endpoint answered with a status code >= 300
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The HTTP client failed before a response was received
    #[error("REST request failed: {0}")]
    Transport(String),

    /// The request was cancelled by the caller
    #[error("The operation was aborted")]
    Aborted,

    /// The query document could not be parsed or prepared
    #[error("Invalid document: {0}")]
    Document(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A result carrying GraphQL errors alongside partial data
    #[error("{message}")]
    Partial {
        message: String,
        result: Box<FetchResult>,
    },

    /// Any other error
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn resolution(msg: impl Into<String>) -> Self {
        Error::Resolution(msg.into())
    }

    /// Convert error to GraphQL error format
    pub fn to_graphql_error(&self) -> GraphQLError {
        GraphQLError {
            message: self.to_string(),
            extensions: self.extensions(),
        }
    }

    /// Get error code for extensions
    fn extensions(&self) -> std::collections::HashMap<String, JsonValue> {
        let mut map = std::collections::HashMap::new();
        let code = match self {
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Resolution(_) => "RESOLUTION_ERROR",
            Error::Server(_) => "SERVER_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Aborted => "ABORTED",
            Error::Document(_) => "INVALID_DOCUMENT",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Partial { .. } => "PARTIAL_RESULT",
            Error::Other(_) => "UNKNOWN_ERROR",
        };
        map.insert("code".to_string(), serde_json::json!(code));
        if let Error::Server(err) = self {
            map.insert("statusCode".to_string(), serde_json::json!(err.status_code()));
        }
        map
    }

    /// The partial result carried by this error, if any
    pub fn partial_result(&self) -> Option<&FetchResult> {
        match self {
            Error::Partial { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Error raised for a REST response with a status code of 300 or more.
///
/// The original response is kept so callers can inspect headers, and the body
/// is parsed on demand through [`ServerError::result`].
#[derive(Error, Debug, Clone)]
#[error("Response not successful: Received status code {}", .response.status)]
pub struct ServerError {
    response: RestResponse,
}

impl ServerError {
    pub fn new(response: RestResponse) -> Self {
        Self { response }
    }

    /// HTTP status code of the failed response
    pub fn status_code(&self) -> u16 {
        self.response.status
    }

    /// The response that triggered this error
    pub fn response(&self) -> &RestResponse {
        &self.response
    }

    /// Response body as JSON, or as a JSON string when the body is not JSON
    pub fn result(&self) -> JsonValue {
        match self.response.json() {
            Ok(value) => value,
            Err(_) => JsonValue::String(self.response.text()),
        }
    }
}

/// GraphQL error response format
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub extensions: std::collections::HashMap<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;

    fn response(status: u16, body: &'static str) -> RestResponse {
        RestResponse {
            url: "https://api.example.com/post/1".to_string(),
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::Configuration("bad config".to_string());
        assert_eq!(err.to_string(), "bad config");

        let err = Error::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "REST request failed: connection refused");

        let err = Error::Document("unknown operation".to_string());
        assert_eq!(err.to_string(), "Invalid document: unknown operation");
    }

    #[test]
    fn test_server_error_message() {
        let err = Error::from(ServerError::new(response(400, "{}")));
        assert_eq!(
            err.to_string(),
            "Response not successful: Received status code 400"
        );
    }

    #[test]
    fn test_server_error_result_json() {
        let err = ServerError::new(response(500, r#"{"message":"boom"}"#));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.result(), serde_json::json!({"message": "boom"}));
    }

    #[test]
    fn test_server_error_result_text_fallback() {
        let err = ServerError::new(response(404, "Not Found"));
        assert_eq!(err.result(), serde_json::json!("Not Found"));
    }

    #[test]
    fn test_to_graphql_error_codes() {
        let gql = Error::resolution("missing").to_graphql_error();
        assert_eq!(gql.message, "missing");
        assert_eq!(gql.extensions["code"], "RESOLUTION_ERROR");

        let gql = Error::from(ServerError::new(response(418, ""))).to_graphql_error();
        assert_eq!(gql.extensions["code"], "SERVER_ERROR");
        assert_eq!(gql.extensions["statusCode"], 418);
    }

    #[test]
    fn test_serialization_error_from() {
        let json_err = serde_json::from_str::<JsonValue>("{invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
