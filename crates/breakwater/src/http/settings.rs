//! Client settings: where requests go and how responses are decoded.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// How a successful response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseAs {
    /// Parse the body as JSON. Requests also default to `Content-Type: application/json`.
    #[default]
    Json,
    /// Decode the body as UTF-8 text.
    Text,
    /// Keep the raw bytes.
    Binary,
}

impl fmt::Display for ResponseAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseAs::Json => f.write_str("json"),
            ResponseAs::Text => f.write_str("text"),
            ResponseAs::Binary => f.write_str("binary"),
        }
    }
}

impl FromStr for ResponseAs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseAs::Json),
            "text" => Ok(ResponseAs::Text),
            "binary" | "arraybuffer" => Ok(ResponseAs::Binary),
            other => Err(Error::Config(format!("unknown response mode '{other}'"))),
        }
    }
}

/// Settings applied to every request a client sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Prefix for relative request URLs
    pub base_url: Option<Url>,
    /// Body decoding mode
    pub response_as: ResponseAs,
}

impl Settings {
    /// Settings with no base URL and JSON decoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `base_url` is not an absolute URL.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref();
        self.base_url =
            Some(Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?);
        Ok(self)
    }

    /// Set the response decoding mode.
    pub fn with_response_as(mut self, response_as: ResponseAs) -> Self {
        self.response_as = response_as;
        self
    }

    /// These settings with every field set in `overrides` replaced.
    pub fn merged_with(&self, overrides: &SettingsOverride) -> Settings {
        Settings {
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| self.base_url.clone()),
            response_as: overrides.response_as.unwrap_or(self.response_as),
        }
    }

    /// Resolve a request URL.
    ///
    /// Absolute URLs are used as given. Relative ones are appended to the base URL, so a
    /// base of `https://api.example.com/v2` and a URL of `/users` give
    /// `https://api.example.com/v2/users`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for a relative URL with no base URL, or when the
    /// combined string does not parse.
    pub fn make_url(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    Error::InvalidUrl(format!("relative URL '{url}' requires a base URL"))
                })?;
                let joined = format!(
                    "{}/{}",
                    base.as_str().trim_end_matches('/'),
                    url.trim_start_matches('/')
                );
                Url::parse(&joined).map_err(|e| Error::InvalidUrl(format!("{joined}: {e}")))
            }
            Err(e) => Err(Error::InvalidUrl(format!("{url}: {e}"))),
        }
    }
}

/// Per-request overrides for [`Settings`]; unset fields keep the client's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverride {
    /// Replacement base URL
    pub base_url: Option<Url>,
    /// Replacement decoding mode
    pub response_as: Option<ResponseAs>,
}
