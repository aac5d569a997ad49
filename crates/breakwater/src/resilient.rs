//! Retrying, breaker-guarded client

use std::sync::Arc;

use breakwater_core::breaker::CircuitBreaker;
use breakwater_core::clock::Clock;
use breakwater_core::error::RetryError;
use breakwater_core::retry::{RetryExecutor, RetryPolicy, RunOutcome};
use http::Method;
use tokio_util::sync::CancellationToken;

use crate::client::HttpClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{FullResponse, RequestOptions, ResponseBody};

/// An [`HttpClient`] whose requests run under a [`RetryExecutor`].
///
/// Each instance owns one circuit breaker (when the policy configures one), so one
/// `ResilientClient` should guard one logical endpoint. Clones share that breaker.
///
/// Failures are collapsed into [`Error`] as follows:
/// - a non-retryable HTTP status is returned as [`Error::Http`] right away
/// - when the budget runs out, the last HTTP failure is returned; if the breaker never let
///   a request through, [`Error::RetryExhausted`] is returned instead
/// - a transport failure returns the last HTTP failure seen before it, or itself if none
/// - cancellation returns [`Error::Aborted`]
///
/// # Example
///
/// ```rust,no_run
/// use breakwater::{HttpClient, RequestOptions, ResilientClient, RetryPolicy};
///
/// # async fn example() -> breakwater::Result<()> {
/// let client = HttpClient::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
/// let resilient = ResilientClient::new(client, RetryPolicy::default());
///
/// let body = resilient.get("/health", RequestOptions::new()).await?;
/// println!("{body:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: HttpClient,
    executor: RetryExecutor,
}

impl ResilientClient {
    /// Wrap `client` with `policy`, on the tokio clock.
    pub fn new(client: HttpClient, policy: RetryPolicy) -> Self {
        Self::with_executor(client, RetryExecutor::new(policy))
    }

    /// Wrap `client` with `policy`, sleeping and reading time through `clock`.
    pub fn with_clock(client: HttpClient, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self::with_executor(client, RetryExecutor::with_clock(policy, clock))
    }

    /// Wrap `client` with a prepared executor, for example one sharing a breaker.
    pub fn with_executor(client: HttpClient, executor: RetryExecutor) -> Self {
        Self { client, executor }
    }

    /// Build the client and policy from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP stack cannot be initialized.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let policy = config.retry.clone().unwrap_or_default();
        Ok(Self::new(HttpClient::from_config(config)?, policy))
    }

    /// The wrapped client.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// The executor driving retries.
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// The breaker guarding this client, if the policy configures one.
    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.executor.breaker()
    }

    /// Run a request under the retry policy and return the raw outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Unclassified`] when a request fails without an HTTP status and
    /// no earlier attempt produced one.
    pub async fn fetch_outcome(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<RunOutcome<FullResponse, Error>, RetryError<Error>> {
        let client = &self.client;
        self.executor
            .run(move || client.request(method.clone(), url, options.clone()))
            .await
    }

    /// Run a request under the retry policy.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<FullResponse> {
        collapse(self.fetch_outcome(method, url, options).await)
    }

    /// Like [`fetch`](Self::fetch), stopping with [`Error::Aborted`] once `token` is
    /// cancelled. A request already in flight is allowed to finish.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn fetch_cancellable(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        token: &CancellationToken,
    ) -> Result<FullResponse> {
        let client = &self.client;
        let outcome = self
            .executor
            .run_cancellable(
                move || client.request(method.clone(), url, options.clone()),
                token,
            )
            .await;
        collapse(outcome)
    }

    /// `GET` with retries, returning the decoded body.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch(Method::GET, url, options).await?.body)
    }

    /// `POST` with retries, returning the decoded body.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch(Method::POST, url, options).await?.body)
    }

    /// `PUT` with retries, returning the decoded body.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch(Method::PUT, url, options).await?.body)
    }

    /// `PATCH` with retries, returning the decoded body.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch(Method::PATCH, url, options).await?.body)
    }

    /// `DELETE` with retries, returning the decoded body.
    ///
    /// # Errors
    ///
    /// See the collapse rules on [`ResilientClient`].
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<ResponseBody> {
        Ok(self.fetch(Method::DELETE, url, options).await?.body)
    }
}

fn collapse(
    outcome: std::result::Result<RunOutcome<FullResponse, Error>, RetryError<Error>>,
) -> Result<FullResponse> {
    match outcome.map_err(RetryError::into_inner)? {
        RunOutcome::Success(response) => Ok(response),
        RunOutcome::Failed(failure) => Err(failure.payload),
        RunOutcome::Exhausted {
            last: Some(failure),
            ..
        } => Err(failure.payload),
        RunOutcome::Exhausted {
            last: None,
            attempts,
            waited,
        } => Err(Error::RetryExhausted { attempts, waited }),
        RunOutcome::Aborted { .. } => Err(Error::Aborted),
    }
}
