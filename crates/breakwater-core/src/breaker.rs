//! Circuit breaker guarding one logical call site.
//!
//! # State Machine
//!
//! ```text
//! CLOSED ──[failure_threshold failures]──► OPEN
//!   ▲                                        │
//!   │                             [open_duration elapsed,
//!   │                              checked on next admit()]
//!   │                                        ▼
//!   └──[success_threshold successes]── HALF-OPEN
//!                 [any failure] ─────────────► OPEN
//! ```
//!
//! The breaker only answers admission queries and records outcomes. It never sleeps,
//! retries, or runs a background timer: the Open → HalfOpen move happens lazily inside
//! [`CircuitBreaker::admit`].
//!
//! # Thread Safety
//!
//! All four fields (`state`, `failure_count`, `success_count`, `next_attempt_at`) live
//! behind one mutex, so concurrent `admit`/`record_*` calls never lose updates. Probes in
//! the half-open state are not deduplicated: several callers may be admitted at once.

use crate::clock::{Clock, TokioClock};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Default number of failures that trips a closed breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default number of half-open successes that closes the breaker.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 1;
/// Default time the breaker stays open before probing, in milliseconds.
pub const DEFAULT_OPEN_DURATION_MS: u64 = 10_000;

/// Immutable thresholds for a [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures in the closed state before the breaker opens.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the breaker closes.
    pub success_threshold: u32,
    /// How long the breaker stays open, in milliseconds.
    pub open_duration_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            open_duration_ms: DEFAULT_OPEN_DURATION_MS,
        }
    }
}

impl CircuitBreakerConfig {
    /// How long the breaker stays open.
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    /// Check the threshold invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either threshold is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::ZeroSuccessThreshold);
        }
        Ok(())
    }
}

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation, every call is admitted.
    Closed,
    /// Endpoint assumed down, calls are denied until the open window elapses.
    Open,
    /// Probing: calls are admitted and the next outcome decides the state.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Answer to [`CircuitBreaker::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed.
    Allowed,
    /// The breaker is open; no call should be made.
    Denied(Rejection),
}

impl Admission {
    /// Whether the call may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Why a call was denied: the breaker is open until `retry_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit breaker open, retry after {remaining:?}")]
pub struct Rejection {
    /// Instant at which the breaker will admit a probe.
    pub retry_at: Instant,
    /// Time left until `retry_at`, measured when the call was denied.
    pub remaining: Duration,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_attempt_at: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            next_attempt_at: None,
        }
    }
}

/// Health tracker and admission gate for one logical call site.
///
/// # Example
///
/// ```rust
/// use breakwater_core::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
///
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig {
///     failure_threshold: 2,
///     ..Default::default()
/// })
/// .unwrap();
///
/// assert!(breaker.admit().is_allowed());
/// breaker.record_failure();
/// breaker.record_failure();
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(!breaker.admit().is_allowed());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker driven by the tokio clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a closed breaker reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn with_clock(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config, clock))
    }

    pub(crate) fn from_validated(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    /// Ask whether a call may proceed.
    ///
    /// An open breaker whose window has elapsed moves to half-open here and admits the
    /// caller.
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Admission::Allowed,
            CircuitState::Open => {
                let now = self.clock.now();
                let retry_at = inner.next_attempt_at.unwrap_or(now);
                if now >= retry_at {
                    Self::move_to_half_open(&mut inner);
                    Admission::Allowed
                } else {
                    Admission::Denied(Rejection {
                        retry_at,
                        remaining: retry_at - now,
                    })
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.config.success_threshold {
                Self::move_to_closed(&mut inner);
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.failure_count += 1;
                self.move_to_open(&mut inner);
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.move_to_open(&mut inner);
                }
            }
            // Late failures from calls admitted before the trip; the open window stands.
            CircuitState::Open => {}
        }
    }

    /// Current state, without triggering the lazy open → half-open check.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failures counted since the last transition.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Half-open successes counted since the last transition.
    pub fn success_count(&self) -> u32 {
        self.lock().success_count
    }

    /// When an open breaker will next admit a probe; `None` unless open.
    pub fn next_attempt_at(&self) -> Option<Instant> {
        let inner = self.lock();
        match inner.state {
            CircuitState::Open => inner.next_attempt_at,
            _ => None,
        }
    }

    /// The thresholds this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn move_to_open(&self, inner: &mut BreakerState) {
        let retry_at = self.clock.now() + self.config.open_duration();
        debug!(
            from = %inner.state,
            failures = inner.failure_count,
            open_ms = self.config.open_duration_ms,
            "Circuit breaker opened"
        );
        inner.state = CircuitState::Open;
        inner.next_attempt_at = Some(retry_at);
    }

    fn move_to_half_open(inner: &mut BreakerState) {
        debug!("Circuit breaker half-open, admitting probe");
        inner.state = CircuitState::HalfOpen;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt_at = None;
    }

    fn move_to_closed(inner: &mut BreakerState) {
        debug!(successes = inner.success_count, "Circuit breaker closed");
        *inner = BreakerState::closed();
    }
}
