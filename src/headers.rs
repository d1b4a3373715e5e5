//! Header merge policies
//!
//! Every REST request carries the link's default headers combined with the
//! headers set on the operation context. How the two groups are combined is
//! decided by a [`HeadersMergePolicy`]:
//!
//! - [`ConcatHeadersMergePolicy`] keeps everything, duplicates included, link
//!   headers first. This is the default.
//! - [`OverrideHeadersMergePolicy`] drops the named link headers so the context
//!   can replace them. It is selected automatically when the context lists
//!   `headers_to_override`.
//!
//! # Example
//!
//! ```rust
//! use graphql_rest_link::{HeadersMergePolicy, OverrideHeadersMergePolicy};
//! use http::HeaderMap;
//!
//! let mut link = HeaderMap::new();
//! link.insert("authorization", "Bearer link".parse().unwrap());
//! link.insert("x-app", "demo".parse().unwrap());
//!
//! let mut context = HeaderMap::new();
//! context.insert("authorization", "Bearer user".parse().unwrap());
//!
//! let policy = OverrideHeadersMergePolicy::new().override_header("Authorization");
//! let merged = policy.merge(&link, &context);
//! assert_eq!(merged.get_all("authorization").iter().count(), 1);
//! assert_eq!(merged["authorization"], "Bearer user");
//! assert_eq!(merged["x-app"], "demo");
//! ```

use crate::{Error, Result};
use http::header::{HeaderName, HeaderValue, ACCEPT};
use http::HeaderMap;
use std::collections::HashSet;

/// Combines link-level and request-level headers
pub trait HeadersMergePolicy: Send + Sync {
    fn merge(&self, link_headers: &HeaderMap, request_headers: &HeaderMap) -> HeaderMap;
}

impl<F> HeadersMergePolicy for F
where
    F: Fn(&HeaderMap, &HeaderMap) -> HeaderMap + Send + Sync,
{
    fn merge(&self, link_headers: &HeaderMap, request_headers: &HeaderMap) -> HeaderMap {
        self(link_headers, request_headers)
    }
}

/// Appends the request headers after the link headers, keeping duplicates
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatHeadersMergePolicy;

impl HeadersMergePolicy for ConcatHeadersMergePolicy {
    fn merge(&self, link_headers: &HeaderMap, request_headers: &HeaderMap) -> HeaderMap {
        concat_headers([link_headers, request_headers])
    }
}

/// Drops the listed link headers, then concatenates the request headers
#[derive(Debug, Clone, Default)]
pub struct OverrideHeadersMergePolicy {
    /// Header names to drop from the link headers (lowercase)
    headers: HashSet<String>,
}

impl OverrideHeadersMergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header to override (case-insensitive)
    pub fn override_header(mut self, header: impl Into<String>) -> Self {
        self.headers.insert(header.into().to_lowercase());
        self
    }

    /// Add multiple headers to override
    pub fn override_many<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for header in headers {
            self.headers.insert(header.into().to_lowercase());
        }
        self
    }

    /// Check whether a link header is dropped by this policy
    pub fn overrides(&self, header_name: &str) -> bool {
        self.headers.contains(&header_name.to_lowercase())
    }
}

impl HeadersMergePolicy for OverrideHeadersMergePolicy {
    fn merge(&self, link_headers: &HeaderMap, request_headers: &HeaderMap) -> HeaderMap {
        let mut kept = HeaderMap::with_capacity(link_headers.len());
        for (name, value) in link_headers {
            if !self.headers.contains(name.as_str()) {
                kept.append(name.clone(), value.clone());
            }
        }
        concat_headers([&kept, request_headers])
    }
}

/// Concatenate header groups in order, keeping duplicate names
pub fn concat_headers<'a>(groups: impl IntoIterator<Item = &'a HeaderMap>) -> HeaderMap {
    let mut merged = HeaderMap::new();
    for group in groups {
        for (name, value) in group {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}

/// Add `accept: application/json` when no accept header is present
pub fn ensure_accept_header(headers: &mut HeaderMap) {
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    }
}

/// Build a [`HeaderMap`] from string pairs, keeping repeated names
pub fn header_map<I, K, V>(pairs: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        headers.append(name, value);
    }
    Ok(headers)
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::configuration(format!("Invalid header name \"{}\": {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::configuration(format!("Invalid value for header \"{}\": {}", name, e)))?;
    Ok((header_name, header_value))
}
