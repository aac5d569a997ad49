#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Resilience core for the Breakwater HTTP client.
//!
//! This crate knows nothing about HTTP. It provides:
//!
//! - **Circuit breaking** via [`CircuitBreaker`](breaker::CircuitBreaker), a three-state
//!   admission gate with lazy open-to-half-open transitions
//! - **Budgeted retries** via [`RetryExecutor`](retry::RetryExecutor), which walks a fixed
//!   delay schedule until a cumulative wait budget is spent
//! - **Pluggable time** via [`Clock`](clock::Clock), so tests can replace real sleeps
//!
//! Callers describe their errors through [`HasStatus`](retry::HasStatus) or a
//! [`Classify`](retry::Classify) implementation; the executor only ever sees status codes.
//!
//! # Examples
//!
//! ```rust
//! use breakwater_core::prelude::*;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("upstream returned {0}")]
//! struct Upstream(u16);
//!
//! impl HasStatus for Upstream {
//!     fn status(&self) -> Option<u16> {
//!         Some(self.0)
//!     }
//! }
//!
//! # async fn example() {
//! let executor = RetryExecutor::new(RetryPolicy::default());
//! match executor.run(|| async { Ok::<_, Upstream>("pong") }).await {
//!     Ok(RunOutcome::Success(body)) => assert_eq!(body, "pong"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # }
//! ```

pub mod breaker;
pub mod clock;
pub mod error;
pub mod retry;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use breakwater_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::breaker::{Admission, CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::clock::{Clock, TokioClock};
    pub use crate::error::{ConfigError, RetryError};
    pub use crate::retry::{
        Classify, FnClassifier, HasStatus, RetryExecutor, RetryPolicy, RunOutcome, TypedFailure,
    };
}
