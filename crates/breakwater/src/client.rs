//! The HTTP client

use std::sync::Arc;
use std::time::Duration;

use breakwater_transport::{HttpTransport, HttpTransportConfig, Transport};
use http::{HeaderMap, Method};

use crate::{
    config::ClientConfig,
    error::{HttpError, Result},
    http::{
        FullResponse, RequestOptions, ResponseAs, ResponseBody, Settings, parse_header,
        request::normalize,
    },
    observability::{RequestMetadata, RequestTimer, ResponseMetadata},
};

/// HTTP client that resolves URLs, normalizes requests and classifies failures.
///
/// A non-2xx response becomes [`Error::Http`](crate::Error::Http); a 2xx body is decoded
/// according to the effective [`ResponseAs`]. The client never retries; wrap it in a
/// [`ResilientClient`](crate::ResilientClient) for that.
///
/// Cloning is cheap and clones share the connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use breakwater::{HttpClient, RequestOptions};
///
/// # async fn example() -> breakwater::Result<()> {
/// let client = HttpClient::builder()
///     .base_url("https://api.example.com/v1")?
///     .build()?;
///
/// let user = client.get("/users/42", RequestOptions::new()).await?;
/// println!("{:?}", user.as_json());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    transport: Arc<dyn Transport>,
    settings: Settings,
    default_headers: HeaderMap,
}

impl HttpClient {
    /// Create a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the HTTP stack cannot be
    /// initialized.
    pub fn new() -> Result<Self> {
        Self::from_config(ClientConfig::default())
    }

    /// Create a new client builder for advanced configuration.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a client from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the HTTP stack cannot be
    /// initialized.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::with_config(HttpTransportConfig {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            pool_max_idle_per_host: config.pool_max_idle_per_host,
        })?;
        Ok(Self::from_transport(
            Arc::new(transport),
            config.settings,
            config.default_headers,
        ))
    }

    /// Create a client on top of a custom [`Transport`].
    pub fn from_transport(
        transport: Arc<dyn Transport>,
        settings: Settings,
        default_headers: HeaderMap,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                settings,
                default_headers,
            }),
        }
    }

    /// Settings applied to every request.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Headers applied to every request.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    /// A client sharing this one's transport, with `settings` instead of the current ones.
    pub fn with_settings(&self, settings: Settings) -> Self {
        self.reconfigured(settings, self.inner.default_headers.clone())
    }

    /// A client sharing this one's transport, with `headers` added to the default headers.
    ///
    /// Headers in `headers` replace default headers of the same name.
    pub fn with_default_headers(&self, headers: HeaderMap) -> Self {
        let mut merged = self.inner.default_headers.clone();
        merged.extend(headers);
        self.reconfigured(self.inner.settings.clone(), merged)
    }

    /// A client sharing this one's transport, with no default headers.
    pub fn without_default_headers(&self) -> Self {
        self.reconfigured(self.inner.settings.clone(), HeaderMap::new())
    }

    fn reconfigured(&self, settings: Settings, default_headers: HeaderMap) -> Self {
        Self::from_transport(self.inner.transport.clone(), settings, default_headers)
    }

    /// Send one request and decode the response.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`](crate::Error::InvalidUrl) if `url` cannot be resolved
    /// - [`Error::Transport`](crate::Error::Transport) if no response arrived
    /// - [`Error::Http`](crate::Error::Http) for a non-2xx status
    /// - [`Error::Decode`](crate::Error::Decode) if a 2xx body is not valid JSON in JSON mode
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<FullResponse> {
        let (request, settings) = normalize(
            method,
            url,
            options,
            &self.inner.settings,
            &self.inner.default_headers,
        )?;

        let mut metadata = RequestMetadata::new(request.method.as_str(), request.url.as_str());
        if let Some(body) = &request.body {
            metadata = metadata.with_body_size(body.len());
        }
        metadata.log_request();

        let timer = RequestTimer::start();
        let response = match self.inner.transport.send_http(request).await {
            Ok(response) => response,
            Err(err) => {
                ResponseMetadata::no_response(timer.elapsed())
                    .log_error(&metadata, &err.to_string());
                return Err(err.into());
            }
        };

        let response_metadata = ResponseMetadata::new(response.status, timer.elapsed())
            .with_body_size(response.body.len());

        if !response.is_success() {
            let error = HttpError::from_response(&response);
            response_metadata.log_error(&metadata, error.message());
            return Err(error.into());
        }
        response_metadata.log_success(&metadata);

        let body = ResponseBody::decode(settings.response_as, response.body)?;
        Ok(FullResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    /// Send a bodiless request decoded as text, returning only the headers.
    async fn headers_only(
        &self,
        method: Method,
        url: &str,
        mut options: RequestOptions,
    ) -> Result<FullResponse> {
        options.body = None;
        options.settings.response_as = Some(ResponseAs::Text);
        self.request(method, url, options).await
    }

    /// `GET` returning the full response.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_get(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.request(Method::GET, url, options).await
    }

    /// `POST` returning the full response.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_post(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.request(Method::POST, url, options).await
    }

    /// `PUT` returning the full response.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_put(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.request(Method::PUT, url, options).await
    }

    /// `PATCH` returning the full response.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_patch(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.request(Method::PATCH, url, options).await
    }

    /// `DELETE` returning the full response.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_delete(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.request(Method::DELETE, url, options).await
    }

    /// `HEAD` returning the full response. Any body in `options` is dropped.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_head(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.headers_only(Method::HEAD, url, options).await
    }

    /// `OPTIONS` returning the full response. Any body in `options` is dropped.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn fetch_options(&self, url: &str, options: RequestOptions) -> Result<FullResponse> {
        self.headers_only(Method::OPTIONS, url, options).await
    }

    /// `GET` returning the decoded body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch_get(url, options).await?.body)
    }

    /// `POST` returning the decoded body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch_post(url, options).await?.body)
    }

    /// `PUT` returning the decoded body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch_put(url, options).await?.body)
    }

    /// `PATCH` returning the decoded body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch_patch(url, options).await?.body)
    }

    /// `DELETE` returning the decoded body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch_delete(url, options).await?.body)
    }

    /// `HEAD` returning the response headers.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<HeaderMap> {
        Ok(self.fetch_head(url, options).await?.headers)
    }

    /// `OPTIONS` returning the response headers.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn options(&self, url: &str, options: RequestOptions) -> Result<HeaderMap> {
        Ok(self.fetch_options(url, options).await?.headers)
    }
}

/// Builder for creating a configured [`HttpClient`].
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl HttpClientBuilder {
    /// Start from an existing configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom transport. Timeout and pool settings are then ignored.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the base URL for relative request URLs.
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

    /// Set the default timeout for requests.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Add a custom default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid according to HTTP specifications.
    pub fn default_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (key, value) = parse_header(key.as_ref(), value.as_ref())?;
        self.config.default_headers.insert(key, value);
        Ok(self)
    }

    /// Build the client with the configured options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the default transport cannot
    /// be initialized.
    pub fn build(self) -> Result<HttpClient> {
        match self.transport {
            Some(transport) => Ok(HttpClient::from_transport(
                transport,
                self.config.settings,
                self.config.default_headers,
            )),
            None => HttpClient::from_config(self.config),
        }
    }
}
