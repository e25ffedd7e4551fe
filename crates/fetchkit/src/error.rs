//! Errors

use fetchkit_http::HttpError;
use thiserror::Error;

/// fetchkit Error
///
/// Cloneable so the same failure can sit in the error slot, be handed to the
/// `on_error` hook and be returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Call site arguments have an unsupported shape
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    /// Resolved configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Transport failure
    #[error(transparent)]
    Network(HttpError),
    /// Request was cancelled
    #[error("The operation was aborted")]
    Aborted,
    /// Request exceeded its time budget
    #[error("Timeout Error")]
    Timeout,
    /// Response completed with a non-2xx status
    #[error("{status_text}")]
    Status {
        /// HTTP status code
        status: u16,
        /// HTTP status text
        status_text: String,
    },
    /// No response type strategy could decode the body
    #[error("Could not extract data from response: {0}")]
    DataExtraction(String),
    /// A user supplied hook broke its contract
    #[error("Contract violation: {0}")]
    ContractViolation(String),
    /// Persistent storage failure
    #[error("Storage error: {0}")]
    Storage(String),
    /// Settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(String),
}

impl Error {
    /// Short machine readable name
    ///
    /// Status errors are named after their code, timeouts surface as `AbortError`.
    pub fn name(&self) -> String {
        match self {
            Error::InvalidArguments(_) => "InvalidArguments".to_string(),
            Error::Configuration(_) => "ConfigurationError".to_string(),
            Error::Network(_) => "NetworkError".to_string(),
            Error::Aborted | Error::Timeout => "AbortError".to_string(),
            Error::Status { status, .. } => status.to_string(),
            Error::DataExtraction(_) => "DataExtractionError".to_string(),
            Error::ContractViolation(_) => "ContractViolation".to_string(),
            Error::Storage(_) => "StorageError".to_string(),
            Error::Settings(_) => "SettingsError".to_string(),
        }
    }

    /// Build a storage error from any displayable failure
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }

    /// Whether this is an explicit cancellation
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Aborted => Error::Aborted,
            other => Error::Network(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(format!("Serialization: {err}"))
    }
}

#[cfg(feature = "settings")]
impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Settings(err.to_string())
    }
}
