//! Transport error types

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures below the HTTP status line: the exchange did not produce a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established or was reset.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request or connect timeout elapsed.
    #[error("Timeout")]
    Timeout,

    /// Any other failure while sending the request or reading the body.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The request could not be built (bad header, unsupported method, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
