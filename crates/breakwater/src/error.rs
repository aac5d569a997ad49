//! Error types for the Breakwater client
//!
//! A request either fails below the status line ([`Error::Transport`]), or the server answers
//! with a non-2xx status and the body is classified into an [`HttpError`]. Only the latter
//! carries a status code, so only the latter is ever retried.

use breakwater_core::error::ConfigError;
use breakwater_core::retry::HasStatus;
use breakwater_transport::{HttpResponse, TransportError};
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message used for binary error bodies.
pub const BINARY_ERROR_MESSAGE: &str = "ArrayBuffer http error, please check details field";
/// Message used when a JSON error body has no `message` field.
pub const UNKNOWN_JSON_MESSAGE: &str = "Unknown error please check details field";
/// Details used when the error response carried no usable body.
pub const NO_DETAILS: &str = "No response for details";

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";

/// A non-2xx response, classified by content type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpError {
    /// Structured error: a JSON body, a plain-text body, or just the status line.
    #[error("HTTP {status}: {message}")]
    Json {
        /// Human-readable message
        message: String,
        /// HTTP status code
        status: u16,
        /// Parsed body, the raw text, or a placeholder when there was no body
        details: Value,
    },

    /// The server answered with `application/octet-stream`.
    #[error("HTTP {status}: {}", BINARY_ERROR_MESSAGE)]
    Binary {
        /// HTTP status code
        status: u16,
        /// Raw response body
        details: Bytes,
    },
}

impl HttpError {
    /// Classify a failed response.
    ///
    /// Rules, in order, for a non-empty body: `application/octet-stream` becomes
    /// [`HttpError::Binary`]; `text/plain` uses the text as both message and details; a
    /// body that parses to a truthy JSON value uses its `message` field. Anything else falls
    /// back to the reason phrase with [`NO_DETAILS`].
    pub fn from_response(response: &HttpResponse) -> Self {
        let status = response.status;

        if !response.body.is_empty() {
            let content_type = response.header(http::header::CONTENT_TYPE.as_str());

            if content_type.is_some_and(|ct| ct.contains(OCTET_STREAM)) {
                return HttpError::Binary {
                    status,
                    details: response.body.clone(),
                };
            }

            let text = response.text();
            if content_type.is_some_and(|ct| ct.contains(TEXT_PLAIN)) {
                return Self::json(text.clone(), status, Value::String(text));
            }

            if let Ok(json) = serde_json::from_str::<Value>(&text)
                && is_truthy(&json)
            {
                let message = match json.get("message") {
                    None | Some(Value::Null) => UNKNOWN_JSON_MESSAGE.to_string(),
                    Some(Value::String(message)) => message.clone(),
                    Some(other) => other.to_string(),
                };
                return Self::json(message, status, json);
            }
        }

        Self::json(
            response.reason().to_string(),
            status,
            Value::String(NO_DETAILS.to_string()),
        )
    }

    fn json(message: String, status: u16, details: Value) -> Self {
        let message = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        HttpError::Json {
            message,
            status,
            details,
        }
    }

    /// HTTP status code of the failed response.
    pub fn status(&self) -> u16 {
        match self {
            HttpError::Json { status, .. } | HttpError::Binary { status, .. } => *status,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            HttpError::Json { message, .. } => message,
            HttpError::Binary { .. } => BINARY_ERROR_MESSAGE,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Main error type for the client.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The exchange failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A successful response body could not be decoded as JSON.
    #[error("Failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// A request body could not be serialized.
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid HTTP header name.
    #[error("Invalid HTTP header name: {0}")]
    InvalidHeaderName(String),

    /// Invalid HTTP header value.
    #[error("Invalid HTTP header value: {0}")]
    InvalidHeaderValue(String),

    /// A configuration value could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A retry policy or breaker config violated its invariants.
    #[error(transparent)]
    Policy(#[from] ConfigError),

    /// The retry budget ran out before the breaker admitted any request.
    #[error("Retry budget exhausted after {attempts} request(s) and {waited:?} of backoff")]
    RetryExhausted {
        /// Requests actually sent
        attempts: u32,
        /// Total backoff waited
        waited: Duration,
    },

    /// The request was cancelled by the caller.
    #[error("Request aborted")]
    Aborted,
}

impl Error {
    /// The classified HTTP error, if this is one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Error::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl HasStatus for Error {
    fn status(&self) -> Option<u16> {
        self.as_http().map(HttpError::status)
    }
}
