//! Retry policy: which statuses to retry, how long to wait, and the total budget.

use crate::breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 3] = [429, 500, 524];
/// Default backoff schedule, in milliseconds.
pub const DEFAULT_DELAYS_MS: [u64; 4] = [600, 3000, 6000, 9000];
/// Default cumulative wait budget, in milliseconds.
pub const DEFAULT_TOTAL_BUDGET_MS: u64 = 60_000;
/// Delay used when the schedule is empty, in milliseconds.
pub const FALLBACK_DELAY_MS: u64 = 9_000;

/// Immutable retry configuration.
///
/// The delay for attempt `n` is `delays[n]`, clamped to the last entry once the schedule
/// runs out, or [`FALLBACK_DELAY_MS`] when the schedule is empty. The loop stops once the
/// summed delays reach `total_budget`.
///
/// Deserializes from millisecond fields and is validated on the way in:
///
/// ```rust
/// use breakwater_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy: RetryPolicy = serde_json::from_str(
///     r#"{"retryable_statuses": [503], "delays_ms": [100, 200], "total_budget_ms": 1000}"#,
/// )
/// .unwrap();
/// assert!(policy.is_retryable_status(503));
/// assert_eq!(policy.delay_for(5), Duration::from_millis(200));
/// assert!(policy.circuit_breaker().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRetryPolicy", into = "RawRetryPolicy")]
pub struct RetryPolicy {
    retryable_statuses: BTreeSet<u16>,
    delays: Vec<Duration>,
    total_budget: Duration,
    circuit_breaker: Option<CircuitBreakerConfig>,
}

impl RetryPolicy {
    /// Start from the defaults and override what you need.
    ///
    /// ```rust
    /// use breakwater_core::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::builder()
    ///     .retryable_statuses([429, 503])
    ///     .delays([Duration::from_millis(250), Duration::from_secs(1)])
    ///     .total_budget(Duration::from_secs(10))
    ///     .without_circuit_breaker()
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(policy.is_retryable_status(503));
    /// assert!(!policy.is_retryable_status(500));
    /// ```
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Whether a typed failure with `status` should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Backoff to apply after the failure of attempt `attempt_index` (0-based).
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.delays
            .get(attempt_index as usize)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::from_millis(FALLBACK_DELAY_MS))
    }

    /// Statuses that are retried.
    pub fn retryable_statuses(&self) -> &BTreeSet<u16> {
        &self.retryable_statuses
    }

    /// The configured delay schedule.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Maximum cumulative backoff for one run.
    pub fn total_budget(&self) -> Duration {
        self.total_budget
    }

    /// Breaker thresholds, if this policy guards its call site with a breaker.
    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerConfig> {
        self.circuit_breaker.as_ref()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            delays: DEFAULT_DELAYS_MS
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            total_budget: Duration::from_millis(DEFAULT_TOTAL_BUDGET_MS),
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Builder for [`RetryPolicy`]. Unset fields keep their defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }
}

impl RetryPolicyBuilder {
    /// Replace the set of retryable status codes.
    ///
    /// Default: 429, 500, 524
    pub fn retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.policy.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Replace the backoff schedule.
    ///
    /// Default: 600ms, 3s, 6s, 9s
    pub fn delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.policy.delays = delays.into_iter().collect();
        self
    }

    /// Set the cumulative wait budget.
    ///
    /// Default: 60s
    pub fn total_budget(mut self, budget: Duration) -> Self {
        self.policy.total_budget = budget;
        self
    }

    /// Guard the call site with a breaker using `config`.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.policy.circuit_breaker = Some(config);
        self
    }

    /// Run without a breaker.
    pub fn without_circuit_breaker(mut self) -> Self {
        self.policy.circuit_breaker = None;
        self
    }

    /// Validate and build the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero budget, a zero delay or invalid breaker thresholds.
    pub fn build(self) -> Result<RetryPolicy, ConfigError> {
        if self.policy.total_budget.is_zero() {
            return Err(ConfigError::ZeroBudget);
        }
        if let Some(index) = self.policy.delays.iter().position(Duration::is_zero) {
            return Err(ConfigError::ZeroDelay { index });
        }
        if let Some(breaker) = &self.policy.circuit_breaker {
            breaker.validate()?;
        }
        Ok(self.policy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRetryPolicy {
    #[serde(default = "default_statuses")]
    retryable_statuses: Vec<u16>,
    #[serde(default = "default_delays_ms")]
    delays_ms: Vec<u64>,
    #[serde(default = "default_total_budget_ms")]
    total_budget_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    circuit_breaker: Option<CircuitBreakerConfig>,
}

fn default_statuses() -> Vec<u16> {
    DEFAULT_RETRYABLE_STATUSES.to_vec()
}

fn default_delays_ms() -> Vec<u64> {
    DEFAULT_DELAYS_MS.to_vec()
}

fn default_total_budget_ms() -> u64 {
    DEFAULT_TOTAL_BUDGET_MS
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(raw: RawRetryPolicy) -> Result<Self, Self::Error> {
        let builder = RetryPolicy::builder()
            .retryable_statuses(raw.retryable_statuses)
            .delays(raw.delays_ms.into_iter().map(Duration::from_millis))
            .total_budget(Duration::from_millis(raw.total_budget_ms));
        match raw.circuit_breaker {
            Some(config) => builder.circuit_breaker(config).build(),
            None => builder.without_circuit_breaker().build(),
        }
    }
}

impl From<RetryPolicy> for RawRetryPolicy {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            retryable_statuses: policy.retryable_statuses.into_iter().collect(),
            delays_ms: policy
                .delays
                .iter()
                .map(|delay| delay.as_millis() as u64)
                .collect(),
            total_budget_ms: policy.total_budget.as_millis() as u64,
            circuit_breaker: policy.circuit_breaker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.retryable_statuses().iter().copied().collect::<Vec<_>>(),
            vec![429, 500, 524]
        );
        assert_eq!(policy.delays().len(), 4);
        assert_eq!(policy.total_budget(), Duration::from_secs(60));
        assert_eq!(
            policy.circuit_breaker(),
            Some(&CircuitBreakerConfig::default())
        );
    }

    #[test]
    fn test_delay_clamps_to_last_entry() {
        let policy = RetryPolicy::builder()
            .delays([600, 3000, 6000].map(Duration::from_millis))
            .build()
            .unwrap();

        assert_eq!(policy.delay_for(0), Duration::from_millis(600));
        assert_eq!(policy.delay_for(2), Duration::from_millis(6000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(6000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(6000));
    }

    #[test]
    fn test_empty_schedule_uses_fallback() {
        let policy = RetryPolicy::builder()
            .delays(Vec::<Duration>::new())
            .build()
            .unwrap();

        assert_eq!(policy.delay_for(0), Duration::from_millis(FALLBACK_DELAY_MS));
        assert_eq!(policy.delay_for(7), Duration::from_millis(FALLBACK_DELAY_MS));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = RetryPolicy::builder()
            .total_budget(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroBudget);
    }

    #[test]
    fn test_zero_delay_rejected() {
        let err = RetryPolicy::builder()
            .delays([600, 0, 3000].map(Duration::from_millis))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroDelay { index: 1 });

        let err = RetryPolicy::builder()
            .delays([Duration::ZERO])
            .total_budget(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroDelay { index: 0 });
    }

    #[test]
    fn test_from_toml_rejects_zero_delay() {
        let result: Result<RetryPolicy, _> =
            toml::from_str("delays_ms = [0]\ntotal_budget_ms = 1000");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("delay at position 0"));
    }

    #[test]
    fn test_invalid_breaker_rejected() {
        let err = RetryPolicy::builder()
            .circuit_breaker(CircuitBreakerConfig {
                success_threshold: 0,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroSuccessThreshold);
    }

    #[test]
    fn test_from_toml_with_breaker() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            retryable_statuses = [429, 503]
            delays_ms = [100]
            total_budget_ms = 5000

            [circuit_breaker]
            failure_threshold = 10
            success_threshold = 2
            open_duration_ms = 3000
            "#,
        )
        .unwrap();

        assert!(policy.is_retryable_status(503));
        assert!(!policy.is_retryable_status(500));
        assert_eq!(policy.total_budget(), Duration::from_secs(5));
        assert_eq!(policy.circuit_breaker().unwrap().failure_threshold, 10);
    }

    #[test]
    fn test_from_toml_rejects_zero_budget() {
        let result: Result<RetryPolicy, _> = toml::from_str("total_budget_ms = 0");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("total_budget"));
    }

    #[test]
    fn test_from_toml_defaults_without_breaker() {
        let policy: RetryPolicy = toml::from_str("").unwrap();

        assert_eq!(policy.delays().len(), DEFAULT_DELAYS_MS.len());
        assert!(policy.circuit_breaker().is_none());
    }

    proptest! {
        #[test]
        fn prop_delay_always_from_schedule(
            delays in proptest::collection::vec(1u64..10_000, 1..8),
            attempt in 0u32..64,
        ) {
            let policy = RetryPolicy::builder()
                .delays(delays.iter().copied().map(Duration::from_millis))
                .build()
                .unwrap();

            let delay = policy.delay_for(attempt).as_millis() as u64;
            let expected = delays.get(attempt as usize).or(delays.last()).copied().unwrap();
            prop_assert_eq!(delay, expected);
        }
    }
}
