//! Decoded responses.

use super::settings::ResponseAs;
use crate::error::{Error, Result};
use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A successful response body, decoded according to [`ResponseAs`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON
    Json(Value),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Binary(Bytes),
}

impl ResponseBody {
    pub(crate) fn decode(mode: ResponseAs, body: Bytes) -> Result<Self> {
        match mode {
            ResponseAs::Json => serde_json::from_slice(&body)
                .map(ResponseBody::Json)
                .map_err(Error::Decode),
            ResponseAs::Text => Ok(ResponseBody::Text(
                String::from_utf8_lossy(&body).into_owned(),
            )),
            ResponseAs::Binary => Ok(ResponseBody::Binary(body)),
        }
    }

    /// Deserialize a JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not JSON or does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value).map_err(Error::Decode),
            ResponseBody::Text(text) => serde_json::from_str(&text).map_err(Error::Decode),
            ResponseBody::Binary(bytes) => serde_json::from_slice(&bytes).map_err(Error::Decode),
        }
    }

    /// The JSON value, if decoded as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The raw bytes, if kept as binary.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A successful response: status, headers and decoded body.
#[derive(Debug, Clone)]
pub struct FullResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Decoded body
    pub body: ResponseBody,
}

impl FullResponse {
    /// Get a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
