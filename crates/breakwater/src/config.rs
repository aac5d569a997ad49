//! Configuration for the Breakwater client

use crate::error::Result;
use crate::http::{ResponseAs, Settings, parse_header};
use breakwater_core::retry::RetryPolicy;
use http::HeaderMap;
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default idle connections kept per host.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Configuration for [`HttpClient`](crate::HttpClient) and
/// [`ResilientClient`](crate::ResilientClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL and response decoding mode
    pub settings: Settings,

    /// Default timeout for requests
    pub timeout: Duration,

    /// Timeout for establishing a connection
    pub connect_timeout: Duration,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Headers included with every request
    pub default_headers: HeaderMap,

    /// Retry policy; `None` leaves [`ResilientClient`](crate::ResilientClient) on the
    /// default policy
    pub retry: Option<RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            default_headers: HeaderMap::new(),
            retry: None,
        }
    }
}

impl ClientConfig {
    /// Start a builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load configuration from environment variables, reading `.env` first if present.
    ///
    /// This will look for:
    /// - `BREAKWATER_BASE_URL` for the base URL
    /// - `BREAKWATER_RESPONSE_AS` for the decoding mode (`json`, `text` or `binary`)
    /// - `BREAKWATER_TIMEOUT` for the request timeout (in seconds)
    /// - `BREAKWATER_CONNECT_TIMEOUT` for the connect timeout (in seconds)
    /// - `BREAKWATER_RETRY_STATUSES` for retryable statuses (comma separated)
    /// - `BREAKWATER_RETRY_DELAYS` for the backoff schedule (comma separated milliseconds)
    /// - `BREAKWATER_RETRY_BUDGET_MS` for the total backoff budget
    ///
    /// Any retry variable switches on a retry policy built from the defaults plus the
    /// values given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a value that does not parse, [`Error::InvalidUrl`] for a
    /// bad base URL, and [`Error::Policy`] when the resulting retry policy is invalid.
    ///
    /// [`Error::Config`]: crate::Error::Config
    /// [`Error::InvalidUrl`]: crate::Error::InvalidUrl
    /// [`Error::Policy`]: crate::Error::Policy
    #[cfg(feature = "env")]
    #[cfg_attr(docsrs, doc(cfg(feature = "env")))]
    pub fn from_env() -> Result<Self> {
        use std::env;

        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(base_url) = env::var("BREAKWATER_BASE_URL") {
            config.settings = config.settings.with_base_url(base_url)?;
        }

        if let Ok(response_as) = env::var("BREAKWATER_RESPONSE_AS") {
            config.settings.response_as = response_as.parse()?;
        }

        if let Ok(timeout) = env::var("BREAKWATER_TIMEOUT") {
            config.timeout = Duration::from_secs(parse_number("BREAKWATER_TIMEOUT", &timeout)?);
        }

        if let Ok(timeout) = env::var("BREAKWATER_CONNECT_TIMEOUT") {
            config.connect_timeout =
                Duration::from_secs(parse_number("BREAKWATER_CONNECT_TIMEOUT", &timeout)?);
        }

        let statuses = env::var("BREAKWATER_RETRY_STATUSES").ok();
        let delays = env::var("BREAKWATER_RETRY_DELAYS").ok();
        let budget = env::var("BREAKWATER_RETRY_BUDGET_MS").ok();

        if statuses.is_some() || delays.is_some() || budget.is_some() {
            let mut builder = RetryPolicy::builder();
            if let Some(statuses) = statuses {
                builder = builder
                    .retryable_statuses(parse_list::<u16>("BREAKWATER_RETRY_STATUSES", &statuses)?);
            }
            if let Some(delays) = delays {
                let delays = parse_list::<u64>("BREAKWATER_RETRY_DELAYS", &delays)?;
                builder = builder.delays(delays.into_iter().map(Duration::from_millis));
            }
            if let Some(budget) = budget {
                builder = builder.total_budget(Duration::from_millis(parse_number(
                    "BREAKWATER_RETRY_BUDGET_MS",
                    &budget,
                )?));
            }
            config.retry = Some(builder.build()?);
        }

        Ok(config)
    }

    /// Merge this configuration with another, with the other taking precedence.
    ///
    /// Fields still at their default in `other` do not override; default headers are
    /// combined with `other`'s winning on conflicts.
    pub fn merge(mut self, other: ClientConfig) -> Self {
        if other.settings.base_url.is_some() {
            self.settings.base_url = other.settings.base_url;
        }
        if other.settings.response_as != ResponseAs::default() {
            self.settings.response_as = other.settings.response_as;
        }
        if other.timeout != DEFAULT_TIMEOUT {
            self.timeout = other.timeout;
        }
        if other.connect_timeout != DEFAULT_CONNECT_TIMEOUT {
            self.connect_timeout = other.connect_timeout;
        }
        if other.pool_max_idle_per_host != DEFAULT_POOL_MAX_IDLE_PER_HOST {
            self.pool_max_idle_per_host = other.pool_max_idle_per_host;
        }
        for (key, value) in other.default_headers.iter() {
            self.default_headers.insert(key.clone(), value.clone());
        }
        if other.retry.is_some() {
            self.retry = other.retry;
        }

        self
    }
}

#[cfg(feature = "env")]
fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| crate::Error::Config(format!("{var}: '{value}' is not a valid number")))
}

#[cfg(feature = "env")]
fn parse_list<T: std::str::FromStr>(var: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_number(var, item))
        .collect()
}

/// Builder for creating [`ClientConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) for a relative or malformed URL.
    pub fn base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        self.config.settings = self.config.settings.with_base_url(base_url)?;
        Ok(self)
    }

    /// Set the response decoding mode.
    pub fn response_as(mut self, response_as: ResponseAs) -> Self {
        self.config.settings.response_as = response_as;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the idle connection limit per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Add a default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid according to HTTP specifications.
    pub fn default_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self> {
        let (key, value) = parse_header(key.as_ref(), value.as_ref())?;
        self.config.default_headers.insert(key, value);
        Ok(self)
    }

    /// Set the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = Some(policy);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
