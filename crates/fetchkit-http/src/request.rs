//! HTTP request value types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::abort::AbortSignal;
use crate::error::HttpError;
use crate::form::{FormData, UrlSearchParams};

/// Name of the content type header
pub const CONTENT_TYPE: &str = "Content-Type";

/// HTTP method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// CONNECT
    Connect,
    /// TRACE
    Trace,
}

impl Method {
    /// Upper-case method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }

    /// Methods that carry a JSON body by default
    pub fn sends_json_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            other => Err(HttpError::Other(format!("Unknown HTTP method: {other}"))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Connect => reqwest::Method::CONNECT,
            Method::Trace => reqwest::Method::TRACE,
        }
    }
}

/// Header map
///
/// Names keep the case they were inserted with; lookups and replacements are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing header with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.insert(name, value.into());
    }

    /// Builder-style [`Headers::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a header value by case-insensitive name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Remove a header by case-insensitive name
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = self
            .0
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        self.0.remove(&key)
    }

    /// Merge `other` on top of `self`; headers in `other` win
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Pre-serialized text, usually JSON
    Text(String),
    /// Multipart form fields, sent as-is
    Form(FormData),
    /// URL-encoded parameters, sent as-is
    Params(UrlSearchParams),
}

impl Body {
    /// Whether the transport should pick the content type for this body
    pub fn is_form_like(&self) -> bool {
        matches!(self, Body::Form(_) | Body::Params(_))
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Text(text) => f.write_str(text),
            Body::Form(form) => write!(f, "{form}"),
            Body::Params(params) => write!(f, "{params}"),
        }
    }
}

/// Options passed to [`Transport::fetch`](crate::Transport::fetch)
///
/// `headers` is `None` when no header is set at all, which is distinct from an
/// empty header map.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// Request headers
    pub headers: Option<Headers>,
    /// Request body
    pub body: Option<Body>,
    /// Cancellation signal
    pub signal: Option<AbortSignal>,
}

impl RequestOptions {
    /// Options for `method` without headers, body or signal
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Set the headers
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the cancellation signal
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip_names() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!("delete".parse::<Method>().ok(), Some(Method::Delete));
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_json_body() {
        assert!(Method::Post.sends_json_body());
        assert!(Method::Put.sends_json_body());
        assert!(Method::Patch.sends_json_body());
        assert!(!Method::Get.sends_json_body());
        assert!(!Method::Delete.sends_json_body());
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new().with("content-type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));

        headers.insert("Content-Type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));

        assert_eq!(headers.remove("content-TYPE").as_deref(), Some("application/json"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_merge_prefers_other() {
        let mut base = Headers::new().with("Accept", "text/html").with("X-One", "1");
        base.merge(&Headers::new().with("accept", "application/json"));

        assert_eq!(base.len(), 2);
        assert_eq!(base.get("Accept"), Some("application/json"));
        assert_eq!(base.get("x-one"), Some("1"));
    }

    #[test]
    fn test_body_display() {
        assert_eq!(Body::Text(r#"{"a":1}"#.to_string()).to_string(), r#"{"a":1}"#);
        let params: UrlSearchParams = [("q", "rust")].into_iter().collect();
        assert_eq!(Body::Params(params).to_string(), "q=rust");
    }
}
