//! Request options and their normalization into a transport request.

use super::settings::{ResponseAs, Settings, SettingsOverride};
use crate::error::{Error, Result};
use breakwater_transport::HttpRequest;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A request body before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as JSON.
    Json(Value),
    /// Sent as-is.
    Text(String),
    /// Sent as-is.
    Bytes(Bytes),
    /// URL-encoded as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Serialize a value into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value).map(Body::Json).map_err(Error::Encode)
    }

    /// Encode into bytes plus the content type the body implies, if any.
    fn encode(self) -> Result<(Bytes, Option<&'static str>)> {
        match self {
            Body::Json(value) => {
                let bytes = serde_json::to_vec(&value).map_err(Error::Encode)?;
                Ok((Bytes::from(bytes), Some(APPLICATION_JSON)))
            }
            Body::Text(text) => Ok((Bytes::from(text), None)),
            Body::Bytes(bytes) => Ok((bytes, None)),
            Body::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                Ok((Bytes::from(encoded), Some(FORM_URLENCODED)))
            }
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

/// Options for a single request.
///
/// ```rust
/// use breakwater::{RequestOptions, ResponseAs};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .header("x-request-id", "abc123")
///     .unwrap()
///     .body(json!({ "name": "Ada" }))
///     .timeout(Duration::from_secs(5))
///     .response_as(ResponseAs::Json);
/// assert!(options.body.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers for this request; they win over the client's default headers.
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<Body>,
    /// Timeout for this request only
    pub timeout: Option<Duration>,
    /// Settings overrides for this request only
    pub settings: SettingsOverride,
}

impl RequestOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value contains invalid characters.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Body::json(value)?);
        Ok(self)
    }

    /// Set a form body.
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Decode this response with `response_as` instead of the client's mode.
    pub fn response_as(mut self, response_as: ResponseAs) -> Self {
        self.settings.response_as = Some(response_as);
        self
    }

    /// Resolve relative URLs against `base_url` for this request.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.settings.base_url = Some(base_url);
        self
    }
}

/// Parse a header pair.
///
/// # Errors
///
/// Returns [`Error::InvalidHeaderName`] or [`Error::InvalidHeaderValue`].
pub fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = name
        .parse::<HeaderName>()
        .map_err(|_| Error::InvalidHeaderName(name.to_string()))?;
    let value = value
        .parse::<HeaderValue>()
        .map_err(|_| Error::InvalidHeaderValue(value.to_string()))?;
    Ok((name, value))
}

/// Build the transport request for one call.
///
/// Header precedence, lowest first: the JSON default `Content-Type` (only in
/// [`ResponseAs::Json`] mode), the content type the body implies, the client's default
/// headers, then the request's own headers.
pub(crate) fn normalize(
    method: Method,
    url: &str,
    options: RequestOptions,
    settings: &Settings,
    default_headers: &HeaderMap,
) -> Result<(HttpRequest, Settings)> {
    let settings = settings.merged_with(&options.settings);
    let url = settings.make_url(url)?;

    let mut headers = HeaderMap::new();
    if settings.response_as == ResponseAs::Json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    }

    let body = match options.body {
        Some(body) => {
            let (bytes, implied) = body.encode()?;
            if let Some(content_type) = implied {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            Some(bytes)
        }
        None => None,
    };

    headers.extend(default_headers.clone());
    headers.extend(options.headers);

    let request = HttpRequest {
        method,
        url,
        headers,
        body,
        timeout: options.timeout,
    };
    Ok((request, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(response_as: ResponseAs) -> Settings {
        Settings::new()
            .with_base_url("https://api.example.com")
            .unwrap()
            .with_response_as(response_as)
    }

    #[test]
    fn test_json_mode_defaults_content_type() {
        let (request, _) = normalize(
            Method::GET,
            "/users",
            RequestOptions::new(),
            &settings(ResponseAs::Json),
            &HeaderMap::new(),
        )
        .unwrap();

        assert_eq!(request.url.as_str(), "https://api.example.com/users");
        assert_eq!(request.headers[CONTENT_TYPE], APPLICATION_JSON);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_text_mode_has_no_default_content_type() {
        let (request, _) = normalize(
            Method::GET,
            "/users",
            RequestOptions::new(),
            &settings(ResponseAs::Text),
            &HeaderMap::new(),
        )
        .unwrap();

        assert!(request.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_caller_content_type_wins() {
        let options = RequestOptions::new()
            .header("content-type", "application/vnd.api+json")
            .unwrap()
            .body(json!({"a": 1}));

        let (request, _) = normalize(
            Method::POST,
            "/users",
            options,
            &settings(ResponseAs::Json),
            &HeaderMap::new(),
        )
        .unwrap();

        assert_eq!(request.headers[CONTENT_TYPE], "application/vnd.api+json");
        assert_eq!(request.body.as_deref(), Some(&br#"{"a":1}"#[..]));
    }

    #[test]
    fn test_request_headers_override_defaults() {
        let mut defaults = HeaderMap::new();
        defaults.insert("x-team", HeaderValue::from_static("core"));
        defaults.insert("x-trace", HeaderValue::from_static("on"));

        let options = RequestOptions::new().header("x-team", "edge").unwrap();
        let (request, _) = normalize(
            Method::GET,
            "/",
            options,
            &settings(ResponseAs::Json),
            &defaults,
        )
        .unwrap();

        assert_eq!(request.headers["x-team"], "edge");
        assert_eq!(request.headers["x-trace"], "on");
    }

    #[test]
    fn test_form_body_is_urlencoded() {
        let options = RequestOptions::new().form([("q", "rust lang"), ("page", "2")]);
        let (request, _) = normalize(
            Method::POST,
            "/search",
            options,
            &settings(ResponseAs::Text),
            &HeaderMap::new(),
        )
        .unwrap();

        assert_eq!(request.headers[CONTENT_TYPE], FORM_URLENCODED);
        assert_eq!(request.body.as_deref(), Some(&b"q=rust+lang&page=2"[..]));
    }

    #[test]
    fn test_per_request_settings_override() {
        let options = RequestOptions::new()
            .response_as(ResponseAs::Binary)
            .base_url(Url::parse("https://mirror.example.com").unwrap())
            .timeout(Duration::from_secs(3));

        let (request, resolved) = normalize(
            Method::GET,
            "/blob",
            options,
            &settings(ResponseAs::Json),
            &HeaderMap::new(),
        )
        .unwrap();

        assert_eq!(request.url.as_str(), "https://mirror.example.com/blob");
        assert_eq!(resolved.response_as, ResponseAs::Binary);
        assert_eq!(request.timeout, Some(Duration::from_secs(3)));
        assert!(request.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(matches!(
            RequestOptions::new().header("bad header", "x"),
            Err(Error::InvalidHeaderName(_))
        ));
        assert!(matches!(
            RequestOptions::new().header("x-ok", "line\nbreak"),
            Err(Error::InvalidHeaderValue(_))
        ));
    }

    #[test]
    fn test_json_helper_serializes_structs() {
        #[derive(Serialize)]
        struct User<'a> {
            name: &'a str,
        }

        let options = RequestOptions::new().json(&User { name: "Ada" }).unwrap();
        assert_eq!(options.body, Some(Body::Json(json!({"name": "Ada"}))));
    }
}
