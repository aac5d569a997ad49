//! Outcome classification.
//!
//! The executor never looks inside an action's error. It asks a [`Classify`]
//! implementation for a status code and files the result into an [`Outcome`].

use super::policy::RetryPolicy;
use crate::breaker::Rejection;
use std::fmt;

/// An error type that may carry a response status code.
pub trait HasStatus {
    /// The status code, or `None` for failures with no typed shape
    /// (connection resets, decode errors, ...).
    fn status(&self) -> Option<u16>;
}

/// Host-supplied mapping from an action error to its status code.
pub trait Classify<E>: Send + Sync {
    /// Status code carried by `error`, if any.
    fn status_of(&self, error: &E) -> Option<u16>;
}

/// Classifier for error types implementing [`HasStatus`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ByStatus;

impl<E: HasStatus> Classify<E> for ByStatus {
    fn status_of(&self, error: &E) -> Option<u16> {
        error.status()
    }
}

/// Classifier built from a closure.
///
/// ```rust
/// use breakwater_core::retry::{Classify, FnClassifier};
///
/// let classifier = FnClassifier::new(|err: &std::io::Error| {
///     err.raw_os_error().map(|code| code as u16)
/// });
/// assert_eq!(classifier.status_of(&std::io::Error::other("boom")), None);
/// ```
#[derive(Clone, Copy)]
pub struct FnClassifier<F>(F);

impl<F> FnClassifier<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnClassifier").finish_non_exhaustive()
    }
}

impl<E, F> Classify<E> for FnClassifier<F>
where
    F: Fn(&E) -> Option<u16> + Send + Sync,
{
    fn status_of(&self, error: &E) -> Option<u16> {
        (self.0)(error)
    }
}

/// A failure that carries a status code, together with the original error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedFailure<E> {
    /// Status code reported by the classifier.
    pub status: u16,
    /// The error the action returned.
    pub payload: E,
}

/// Classified result of a single attempt.
#[derive(Debug)]
pub enum Outcome<T, E> {
    /// The action returned a value.
    Success(T),
    /// The action failed with a status code.
    TypedFailure(TypedFailure<E>),
    /// The action failed with something the classifier could not type.
    UnknownFailure(E),
    /// The breaker denied admission, so the action was never invoked.
    BreakerRejected(Rejection),
}

impl<T, E> Outcome<T, E> {
    /// File an action result under the right variant.
    pub fn classify<C>(result: Result<T, E>, classifier: &C) -> Self
    where
        C: Classify<E> + ?Sized,
    {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => match classifier.status_of(&error) {
                Some(status) => Outcome::TypedFailure(TypedFailure {
                    status,
                    payload: error,
                }),
                None => Outcome::UnknownFailure(error),
            },
        }
    }

    /// Whether the executor should back off and try again.
    ///
    /// A breaker rejection is always retryable, including from a breaker shared through
    /// [`RetryExecutor::with_breaker`](super::RetryExecutor::with_breaker) while the policy
    /// itself carries none.
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            Outcome::TypedFailure(failure) => policy.is_retryable_status(failure.status),
            Outcome::BreakerRejected(_) => true,
            Outcome::Success(_) | Outcome::UnknownFailure(_) => false,
        }
    }

    /// Whether the action ran and failed.
    pub fn is_failed_call(&self) -> bool {
        matches!(self, Outcome::TypedFailure(_) | Outcome::UnknownFailure(_))
    }
}
