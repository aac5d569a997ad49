//! Error types for the resilience core.

use thiserror::Error;

/// A policy or breaker configuration that violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `failure_threshold` must be at least 1.
    #[error("circuit breaker failure_threshold must be greater than zero")]
    ZeroFailureThreshold,

    /// `success_threshold` must be at least 1.
    #[error("circuit breaker success_threshold must be greater than zero")]
    ZeroSuccessThreshold,

    /// The total retry budget must be non-zero.
    #[error("retry total_budget must be greater than zero")]
    ZeroBudget,

    /// Every backoff delay must be non-zero, or the budget is never consumed.
    #[error("retry delay at position {index} must be greater than zero")]
    ZeroDelay {
        /// Position of the offending entry in the schedule.
        index: usize,
    },
}

/// Failure of a [`RetryExecutor`](crate::retry::RetryExecutor) run that could not be
/// expressed as a typed outcome.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The action failed with an error that carries no status code, and no typed failure
    /// was observed earlier in the run to stand in for it.
    #[error("action failed with an unclassified error: {0}")]
    Unclassified(#[source] E),
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Unwrap the underlying action error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Unclassified(err) => err,
        }
    }
}
