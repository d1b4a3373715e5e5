//! Request body serializers
//!
//! Mutation bodies are JSON values until they reach the wire. A
//! [`BodySerializer`] turns the value into bytes and may adjust the request
//! headers, usually to set `content-type`. JSON is the default; other
//! serializers are registered on the link by name and selected per field with
//! `@rest(bodySerializer: "name")`.

use crate::{Error, Result};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use serde_json::Value as JsonValue;

/// A serialized body with the headers to send alongside it
#[derive(Debug, Clone)]
pub struct SerializedBody {
    pub body: Bytes,
    pub headers: HeaderMap,
}

/// Encodes a request body
pub trait BodySerializer: Send + Sync {
    fn serialize(&self, data: &JsonValue, headers: HeaderMap) -> Result<SerializedBody>;
}

impl<F> BodySerializer for F
where
    F: Fn(&JsonValue, HeaderMap) -> Result<SerializedBody> + Send + Sync,
{
    fn serialize(&self, data: &JsonValue, headers: HeaderMap) -> Result<SerializedBody> {
        self(data, headers)
    }
}

/// Serializes the body as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodySerializer;

impl BodySerializer for JsonBodySerializer {
    fn serialize(&self, data: &JsonValue, mut headers: HeaderMap) -> Result<SerializedBody> {
        set_content_type(&mut headers, "application/json");
        Ok(SerializedBody {
            body: Bytes::from(serde_json::to_vec(data)?),
            headers,
        })
    }
}

/// Serializes an object body as `application/x-www-form-urlencoded`.
///
/// Nested objects and arrays use bracket notation (`a[b]=1`, `a[0]=x`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FormUrlEncodedSerializer;

impl BodySerializer for FormUrlEncodedSerializer {
    fn serialize(&self, data: &JsonValue, mut headers: HeaderMap) -> Result<SerializedBody> {
        let encoded = encode_json_as_form(data)?;
        set_content_type(&mut headers, "application/x-www-form-urlencoded");
        Ok(SerializedBody {
            body: Bytes::from(encoded),
            headers,
        })
    }
}

/// Sends string bodies as-is; other values fall back to their JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBodySerializer;

impl BodySerializer for RawBodySerializer {
    fn serialize(&self, data: &JsonValue, headers: HeaderMap) -> Result<SerializedBody> {
        let body = match data {
            JsonValue::String(s) => Bytes::from(s.clone()),
            other => Bytes::from(serde_json::to_vec(other)?),
        };
        Ok(SerializedBody { body, headers })
    }
}

fn set_content_type(headers: &mut HeaderMap, content_type: &'static str) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
}

/// Encode a JSON object as a form body, nesting keys as `a[b]` and `a[0]`
pub fn encode_json_as_form(value: &JsonValue) -> Result<String> {
    if !value.is_object() {
        return Err(Error::resolution(
            "Expected URL-encoded form bodies to be objects",
        ));
    }

    fn encode(
        encoded: &mut form_urlencoded::Serializer<'_, String>,
        value: &JsonValue,
        prefix: &str,
    ) {
        match value {
            JsonValue::Null => {
                encoded.append_pair(prefix, "");
            }
            JsonValue::String(s) => {
                encoded.append_pair(prefix, s);
            }
            JsonValue::Bool(b) => {
                encoded.append_pair(prefix, if *b { "true" } else { "false" });
            }
            JsonValue::Number(n) => {
                encoded.append_pair(prefix, &n.to_string());
            }
            JsonValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    encode(encoded, item, &format!("{prefix}[{i}]"));
                }
            }
            JsonValue::Object(map) => {
                for (key, item) in map {
                    if prefix.is_empty() {
                        encode(encoded, item, key);
                    } else {
                        encode(encoded, item, &format!("{prefix}[{key}]"));
                    }
                }
            }
        }
    }

    let mut encoded = form_urlencoded::Serializer::new(String::new());
    encode(&mut encoded, value, "");
    Ok(encoded.finish())
}
