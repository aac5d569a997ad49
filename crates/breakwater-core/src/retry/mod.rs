//! Budgeted retries with scheduled backoff.
//!
//! # Key Types
//!
//! - [`RetryPolicy`] - retryable statuses, delay schedule and total wait budget
//! - [`RetryExecutor`] - runs an async action under a policy and an optional breaker
//! - [`Outcome`] / [`RunOutcome`] - classification of one attempt and of a whole run
//!
//! # Examples
//!
//! ```rust
//! use breakwater_core::retry::{FnClassifier, RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::builder()
//!     .delays([Duration::from_millis(10)])
//!     .total_budget(Duration::from_millis(50))
//!     .without_circuit_breaker()
//!     .build()
//!     .unwrap();
//!
//! let executor = RetryExecutor::new(policy)
//!     .with_classifier(FnClassifier::new(|_: &std::io::Error| Some(500)));
//!
//! let outcome = executor
//!     .run(|| async { Ok::<_, std::io::Error>(42) })
//!     .await
//!     .unwrap();
//! assert!(outcome.is_success());
//! # }
//! ```

mod executor;
mod outcome;
mod policy;

pub use executor::{RetryExecutor, RunOutcome};
pub use outcome::{ByStatus, Classify, FnClassifier, HasStatus, Outcome, TypedFailure};
pub use policy::{
    DEFAULT_DELAYS_MS, DEFAULT_RETRYABLE_STATUSES, DEFAULT_TOTAL_BUDGET_MS, FALLBACK_DELAY_MS,
    RetryPolicy, RetryPolicyBuilder,
};
