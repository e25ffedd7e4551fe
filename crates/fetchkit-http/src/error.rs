//! Transport errors

use thiserror::Error;

/// Failure to complete an exchange with the server
///
/// Reaching the server and getting a non-2xx status back is not a failure here:
/// [`Transport::fetch`] resolves to a [`RawResponse`] with `ok() == false`.
///
/// [`Transport::fetch`]: crate::Transport::fetch
/// [`RawResponse`]: crate::RawResponse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// Could not connect to the server
    #[error("Failed to connect: {0}")]
    Connection(String),
    /// reqwest gave up waiting
    #[error("Request timed out")]
    Timeout,
    /// Cancelled through an [`AbortSignal`](crate::AbortSignal)
    #[error("The operation was aborted")]
    Aborted,
    /// Body could not be encoded or decoded
    #[error("Invalid body: {0}")]
    Serialization(String),
    /// Proxy settings were rejected
    #[error("Invalid proxy: {0}")]
    Proxy(String),
    /// reqwest refused the client or request configuration
    #[error("Invalid client configuration: {0}")]
    Build(String),
    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl HttpError {
    /// Whether the exchange was cancelled rather than failed
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }

        let message = err.to_string();
        if err.is_connect() {
            Self::Connection(message)
        } else if err.is_builder() {
            Self::Build(message)
        } else if err.is_decode() || err.is_body() {
            Self::Serialization(message)
        } else {
            Self::Other(message)
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
