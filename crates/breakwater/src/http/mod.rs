//! HTTP layer: settings, request normalization and response decoding.

pub use request::{Body, RequestOptions, parse_header};
pub use response::{FullResponse, ResponseBody};
pub use settings::{ResponseAs, Settings, SettingsOverride};

pub(crate) mod request;
mod response;
mod settings;

// Re-export HTTP types from the http crate for convenience
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
