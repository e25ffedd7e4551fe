//! HTTP response types

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::HttpError;
use crate::request::Headers;

/// Result type for HTTP operations - generic over the body type R and error type E
pub type Response<R, E = HttpError> = Result<R, E>;

/// Fully buffered HTTP response
///
/// The body is read eagerly, so cloning is cheap and every reader sees the
/// whole payload; reading the body never consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    status: u16,
    status_text: String,
    headers: Headers,
    url: String,
    redirected: bool,
    body: Bytes,
}

impl RawResponse {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            status,
            status_text,
            headers: Headers::new(),
            url: String::new(),
            redirected: false,
            body: body.into(),
        }
    }

    /// Buffer a reqwest response
    pub(crate) async fn from_reqwest(
        response: reqwest::Response,
        requested_url: &str,
    ) -> Response<Self> {
        let status = response.status();
        let url = response.url().to_string();
        let redirected = url.trim_end_matches('/') != requested_url.trim_end_matches('/');
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(HttpError::from)?;

        Ok(Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            url,
            redirected,
            body,
        })
    }

    /// Override the status text
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all headers
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the final URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Mark the response as the result of a redirect
    pub fn with_redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check if the response status is a success (2xx)
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Reason phrase
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Final URL after redirects
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the request was redirected
    pub fn redirected(&self) -> bool {
        self.redirected
    }

    /// Raw body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the response body as text
    pub fn text(&self) -> Response<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpError::Serialization(e.to_string()))
    }

    /// Get the response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Response<T> {
        serde_json::from_slice(&self.body).map_err(HttpError::from)
    }

    /// Get the response body as bytes
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }
}
