//! Response data extraction

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use fetchkit_http::RawResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Decoded response payload
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Parsed JSON document
    Json(Value),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
}

impl Data {
    /// Whether the payload carries nothing
    ///
    /// JSON `null`, the empty string and zero bytes count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Data::Json(value) => value.is_null(),
            Data::Text(text) => text.is_empty(),
            Data::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// JSON value, if this is JSON
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Data::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Bytes, if this is binary
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Data::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Number of items when the payload is a JSON array
    pub fn item_count(&self) -> Option<usize> {
        self.as_json().and_then(Value::as_array).map(Vec::len)
    }

    /// Deserialize a JSON payload into `T`
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match self {
            Data::Json(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::DataExtraction(e.to_string())),
            _ => Err(Error::DataExtraction(
                "payload is not a JSON document".to_string(),
            )),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Json(value)
    }
}

impl From<String> for Data {
    fn from(text: String) -> Self {
        Data::Text(text)
    }
}

impl From<&str> for Data {
    fn from(text: &str) -> Self {
        Data::Text(text.to_string())
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Data::Bytes(bytes)
    }
}

/// Body decoding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseType {
    /// Parse the body as JSON
    Json,
    /// Decode the body as UTF-8 text
    Text,
    /// Keep the raw bytes
    Blob,
    /// Keep the raw bytes
    ArrayBuffer,
    /// Multipart form decoding, not supported by buffered responses
    FormData,
    /// Hand the body over as bytes
    ReadableStream,
}

impl ResponseType {
    /// Strategies tried when none are configured
    pub const DEFAULT: [ResponseType; 3] =
        [ResponseType::Json, ResponseType::Text, ResponseType::Blob];

    /// Apply this strategy to a response body
    pub fn extract(&self, response: &RawResponse) -> Result<Data, Error> {
        match self {
            ResponseType::Json => response
                .json::<Value>()
                .map(Data::Json)
                .map_err(|e| Error::DataExtraction(e.to_string())),
            ResponseType::Text => response
                .text()
                .map(Data::Text)
                .map_err(|e| Error::DataExtraction(e.to_string())),
            ResponseType::Blob | ResponseType::ArrayBuffer | ResponseType::ReadableStream => {
                Ok(Data::Bytes(response.bytes()))
            }
            ResponseType::FormData => Err(Error::DataExtraction(
                "form data bodies cannot be decoded".to_string(),
            )),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseType::Json => "json",
            ResponseType::Text => "text",
            ResponseType::Blob => "blob",
            ResponseType::ArrayBuffer => "arrayBuffer",
            ResponseType::FormData => "formData",
            ResponseType::ReadableStream => "readableStream",
        };
        f.write_str(name)
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ResponseType::Json),
            "text" => Ok(ResponseType::Text),
            "blob" => Ok(ResponseType::Blob),
            "arrayBuffer" => Ok(ResponseType::ArrayBuffer),
            "formData" => Ok(ResponseType::FormData),
            "readableStream" => Ok(ResponseType::ReadableStream),
            other => Err(Error::Configuration(format!(
                "unknown response type `{other}`"
            ))),
        }
    }
}

/// Decode a response body with the first strategy that succeeds
///
/// When the decoded payload is empty and a default is given, the default is
/// returned instead.
pub fn try_get_data(
    response: &RawResponse,
    default: Option<&Data>,
    response_types: &[ResponseType],
) -> Result<Data, Error> {
    let mut last_error = None;
    let mut data = None;

    for response_type in response_types {
        match response_type.extract(response) {
            Ok(extracted) => {
                data = Some(extracted);
                break;
            }
            Err(err) => {
                tracing::trace!("Response type {} failed: {}", response_type, err);
                last_error = Some(err);
            }
        }
    }

    let data = match data {
        Some(data) => data,
        None => {
            return Err(last_error.unwrap_or_else(|| {
                Error::DataExtraction("no response type configured".to_string())
            }))
        }
    };

    match default {
        Some(default) if data.is_empty() => Ok(default.clone()),
        _ => Ok(data),
    }
}
