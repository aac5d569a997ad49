//! The retry loop.

use super::outcome::{ByStatus, Classify, Outcome, TypedFailure};
use super::policy::RetryPolicy;
use crate::breaker::{Admission, CircuitBreaker};
use crate::clock::{Clock, TokioClock};
use crate::error::RetryError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a run ended, when it ended without an unclassified error.
#[derive(Debug)]
pub enum RunOutcome<T, E> {
    /// An attempt succeeded.
    Success(T),
    /// A typed failure ended the run: either its status is not retryable, or an untyped
    /// failure followed it.
    Failed(TypedFailure<E>),
    /// The wait budget ran out.
    Exhausted {
        /// Last typed failure, `None` if every slot was spent on breaker rejections.
        last: Option<TypedFailure<E>>,
        /// Number of times the action was actually invoked.
        attempts: u32,
        /// Sum of all backoff delays waited.
        waited: Duration,
    },
    /// The caller cancelled the run.
    Aborted {
        /// Last typed failure seen before cancellation.
        last: Option<TypedFailure<E>>,
    },
}

impl<T, E> RunOutcome<T, E> {
    /// Whether the run produced a value.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    /// Convert into a `Result`, folding every non-success into its last typed failure.
    ///
    /// Runs that end without any typed failure (all attempts rejected by the breaker, or
    /// aborted before the first call) yield `Err(None)`.
    pub fn into_result(self) -> Result<T, Option<TypedFailure<E>>> {
        match self {
            RunOutcome::Success(value) => Ok(value),
            RunOutcome::Failed(failure) => Err(Some(failure)),
            RunOutcome::Exhausted { last, .. } | RunOutcome::Aborted { last } => Err(last),
        }
    }
}

#[derive(Debug)]
struct AttemptState<E> {
    attempt_index: u32,
    invocations: u32,
    elapsed_wait: Duration,
    last: Option<TypedFailure<E>>,
}

impl<E> AttemptState<E> {
    fn new() -> Self {
        Self {
            attempt_index: 0,
            invocations: 0,
            elapsed_wait: Duration::ZERO,
            last: None,
        }
    }
}

/// Drives an async action under a [`RetryPolicy`] and an optional [`CircuitBreaker`].
///
/// Executors are cheap to clone; clones share the breaker, so a breaker opened by one
/// run denies the next run on any clone.
///
/// # Example
///
/// ```rust
/// use breakwater_core::retry::{HasStatus, RetryExecutor, RetryPolicy, RunOutcome};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("status {0}")]
/// struct Status(u16);
///
/// impl HasStatus for Status {
///     fn status(&self) -> Option<u16> {
///         Some(self.0)
///     }
/// }
///
/// # async fn example() {
/// let executor = RetryExecutor::new(RetryPolicy::default());
/// let outcome = executor
///     .run(|| async { Err::<(), _>(Status(404)) })
///     .await
///     .unwrap();
///
/// assert!(matches!(outcome, RunOutcome::Failed(f) if f.status == 404));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor<C = ByStatus> {
    policy: RetryPolicy,
    breaker: Option<Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
    classifier: C,
}

impl RetryExecutor<ByStatus> {
    /// Create an executor on the tokio clock.
    ///
    /// A breaker is created from the policy's breaker config, if it has one.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_clock(policy, Arc::new(TokioClock))
    }

    /// Create an executor that sleeps and reads time through `clock`.
    pub fn with_clock(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        let breaker = policy
            .circuit_breaker()
            .cloned()
            .map(|config| Arc::new(CircuitBreaker::from_validated(config, clock.clone())));
        Self {
            policy,
            breaker,
            clock,
            classifier: ByStatus,
        }
    }
}

impl<C> RetryExecutor<C> {
    /// Swap the classifier used to read status codes from action errors.
    pub fn with_classifier<C2>(self, classifier: C2) -> RetryExecutor<C2> {
        RetryExecutor {
            policy: self.policy,
            breaker: self.breaker,
            clock: self.clock,
            classifier,
        }
    }

    /// Share `breaker` with other executors guarding the same endpoint.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// The policy this executor runs under.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The breaker guarding this executor's call site.
    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// Run `action` until it succeeds, fails terminally, or the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Unclassified`] when the action fails with an error the
    /// classifier cannot type and no typed failure preceded it.
    pub async fn run<F, Fut, T, E>(&self, action: F) -> Result<RunOutcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        C: Classify<E>,
    {
        self.drive(action, None).await
    }

    /// Like [`run`](Self::run), but stops with [`RunOutcome::Aborted`] once `token` is
    /// cancelled, including in the middle of a backoff sleep.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_cancellable<F, Fut, T, E>(
        &self,
        action: F,
        token: &CancellationToken,
    ) -> Result<RunOutcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        C: Classify<E>,
    {
        self.drive(action, Some(token)).await
    }

    async fn drive<F, Fut, T, E>(
        &self,
        mut action: F,
        token: Option<&CancellationToken>,
    ) -> Result<RunOutcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        C: Classify<E>,
    {
        let budget = self.policy.total_budget();
        let mut state = AttemptState::new();

        while state.elapsed_wait < budget {
            if token.is_some_and(CancellationToken::is_cancelled) {
                return Ok(RunOutcome::Aborted { last: state.last });
            }

            let delay = self.policy.delay_for(state.attempt_index);
            let outcome = self.attempt(&mut action, &mut state).await;
            let retryable = outcome.is_retryable(&self.policy);
            match outcome {
                Outcome::Success(value) => return Ok(RunOutcome::Success(value)),
                Outcome::TypedFailure(failure) if retryable => {
                    warn!(
                        attempt = state.attempt_index + 1,
                        status = failure.status,
                        delay = ?delay,
                        waited = ?state.elapsed_wait,
                        "Retryable failure, backing off"
                    );
                    state.last = Some(failure);
                }
                Outcome::TypedFailure(failure) => {
                    debug!(status = failure.status, "Non-retryable failure");
                    return Ok(RunOutcome::Failed(failure));
                }
                Outcome::UnknownFailure(error) => {
                    debug!(error = %error, "Unclassified failure");
                    return state
                        .last
                        .map(RunOutcome::Failed)
                        .ok_or(RetryError::Unclassified(error));
                }
                Outcome::BreakerRejected(rejection) => {
                    debug!(
                        remaining = ?rejection.remaining,
                        delay = ?delay,
                        "Circuit breaker denied attempt, backing off"
                    );
                }
            }

            match token {
                Some(token) => {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            return Ok(RunOutcome::Aborted { last: state.last });
                        }
                        () = self.clock.sleep(delay) => {}
                    }
                }
                None => self.clock.sleep(delay).await,
            }
            state.elapsed_wait += delay;
            state.attempt_index += 1;
        }

        debug!(
            attempts = state.invocations,
            waited = ?state.elapsed_wait,
            "Retry budget exhausted"
        );
        Ok(RunOutcome::Exhausted {
            last: state.last,
            attempts: state.invocations,
            waited: state.elapsed_wait,
        })
    }

    async fn attempt<F, Fut, T, E>(
        &self,
        action: &mut F,
        state: &mut AttemptState<E>,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
    {
        if let Some(breaker) = &self.breaker
            && let Admission::Denied(rejection) = breaker.admit()
        {
            return Outcome::BreakerRejected(rejection);
        }

        state.invocations += 1;
        let outcome = Outcome::classify(action().await, &self.classifier);

        if let Some(breaker) = &self.breaker {
            if outcome.is_failed_call() {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{CircuitBreakerConfig, CircuitState};
    use crate::clock::ManualClock;
    use crate::retry::{FnClassifier, HasStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("call failed ({0:?})")]
    struct CallError(Option<u16>);

    impl HasStatus for CallError {
        fn status(&self) -> Option<u16> {
            self.0
        }
    }

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    fn policy_without_breaker(delays: &[u64], budget_ms: u64) -> RetryPolicy {
        RetryPolicy::builder()
            .delays(ms(delays))
            .total_budget(Duration::from_millis(budget_ms))
            .without_circuit_breaker()
            .build()
            .unwrap()
    }

    fn executor(policy: RetryPolicy) -> (RetryExecutor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (RetryExecutor::with_clock(policy, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (executor, clock) = executor(RetryPolicy::default());

        let outcome = executor
            .run(|| async { Ok::<_, CallError>("ok") })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Success("ok")));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_exhausts_budget_with_retryable_status() {
        let (executor, clock) = executor(policy_without_breaker(&[600, 3000, 6000], 9000));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CallError(Some(500)))
                }
            })
            .await
            .unwrap();

        match outcome {
            RunOutcome::Exhausted {
                last,
                attempts,
                waited,
            } => {
                assert_eq!(last.unwrap().status, 500);
                assert_eq!(attempts, 3);
                assert_eq!(waited, Duration::from_millis(9600));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps(), ms(&[600, 3000, 6000]));
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let (executor, clock) = executor(policy_without_breaker(&[600, 3000, 6000], 60_000));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CallError(Some(429)))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Success(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps(), ms(&[600, 3000]));
    }

    #[tokio::test]
    async fn test_non_retryable_status_returns_immediately() {
        let (executor, clock) = executor(RetryPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CallError(Some(404)))
                }
            })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Failed(ref f) if f.status == 404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_failure_without_prior_typed_failure() {
        let (executor, _clock) = executor(RetryPolicy::default());

        let err = executor
            .run(|| async { Err::<(), _>(CallError(None)) })
            .await
            .unwrap_err();

        assert_eq!(err.into_inner(), CallError(None));
    }

    #[tokio::test]
    async fn test_unknown_failure_returns_last_typed_failure() {
        let (executor, clock) = executor(policy_without_breaker(&[600], 60_000));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err::<(), _>(CallError(Some(524)))
                    } else {
                        Err(CallError(None))
                    }
                }
            })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Failed(ref f) if f.status == 524));
        assert_eq!(clock.sleeps(), ms(&[600]));
    }

    #[tokio::test]
    async fn test_open_breaker_consumes_delay_slots() {
        let policy = RetryPolicy::builder()
            .delays(ms(&[600, 3000, 6000]))
            .total_budget(Duration::from_millis(9000))
            .circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                open_duration_ms: 60_000,
            })
            .build()
            .unwrap();
        let (executor, clock) = executor(policy);
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CallError(Some(500)))
                }
            })
            .await
            .unwrap();

        match outcome {
            RunOutcome::Exhausted { last, attempts, .. } => {
                assert_eq!(last.unwrap().status, 500);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(clock.sleeps(), ms(&[600, 3000, 6000]));
        assert_eq!(
            executor.breaker().map(|b| b.state()),
            Some(CircuitState::Open)
        );
    }

    #[tokio::test]
    async fn test_breaker_half_open_probe_recovers() {
        let policy = RetryPolicy::builder()
            .delays(ms(&[1000]))
            .total_budget(Duration::from_secs(60))
            .circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                open_duration_ms: 2500,
            })
            .build()
            .unwrap();
        let (executor, clock) = executor(policy);
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CallError(Some(500)))
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Success("recovered")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Denied at 1000ms and 2000ms, probe admitted at 3000ms.
        assert_eq!(clock.sleeps(), ms(&[1000, 1000, 1000]));
        assert_eq!(
            executor.breaker().map(|b| b.state()),
            Some(CircuitState::Closed)
        );
    }

    #[tokio::test]
    async fn test_shared_breaker_across_executors() {
        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(
            CircuitBreaker::with_clock(
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    success_threshold: 1,
                    open_duration_ms: 60_000,
                },
                clock.clone(),
            )
            .unwrap(),
        );
        breaker.record_failure();

        let executor = RetryExecutor::with_clock(policy_without_breaker(&[100], 250), clock.clone())
            .with_breaker(breaker);
        let outcome = executor
            .run(|| async { Ok::<_, CallError>(()) })
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Exhausted {
                last: None,
                attempts: 0,
                ..
            }
        ));
        assert_eq!(clock.sleeps(), ms(&[100, 100, 100]));
    }

    #[tokio::test]
    async fn test_empty_schedule_uses_fallback_delay() {
        let (executor, clock) = executor(policy_without_breaker(&[], 10_000));

        let outcome = executor
            .run(|| async { Err::<(), _>(CallError(Some(500))) })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Exhausted { attempts: 2, .. }));
        assert_eq!(clock.sleeps(), ms(&[9000, 9000]));
    }

    #[tokio::test]
    async fn test_cancellation_before_first_attempt() {
        let (executor, _clock) = executor(RetryPolicy::default());
        let token = CancellationToken::new();
        token.cancel();

        let outcome = executor
            .run_cancellable(|| async { Ok::<_, CallError>(()) }, &token)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Aborted { last: None }));
    }

    #[tokio::test]
    async fn test_cancellation_during_run() {
        let (executor, clock) = executor(policy_without_breaker(&[600], 60_000));
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run_cancellable(
                || {
                    let calls = calls.clone();
                    let token = token.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                            token.cancel();
                        }
                        Err::<(), _>(CallError(Some(500)))
                    }
                },
                &token,
            )
            .await
            .unwrap();

        match outcome {
            RunOutcome::Aborted { last } => assert_eq!(last.unwrap().status, 500),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(clock.sleeps(), ms(&[600]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_tokio_sleep() {
        let executor = RetryExecutor::new(policy_without_breaker(&[30_000], 60_000));
        let token = CancellationToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = executor
            .run_cancellable(|| async { Err::<(), _>(CallError(Some(429))) }, &token)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Aborted { last: Some(_) }));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let (executor, clock) = executor(policy_without_breaker(&[50], 60_000));
        let executor = executor.with_classifier(FnClassifier::new(|err: &std::io::Error| {
            (err.kind() == std::io::ErrorKind::TimedOut).then_some(524)
        }));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(clock.sleeps(), ms(&[50]));
    }

    #[test]
    fn test_into_result() {
        let ok: RunOutcome<u8, CallError> = RunOutcome::Success(1);
        assert_eq!(ok.into_result().unwrap(), 1);

        let failed: RunOutcome<u8, CallError> = RunOutcome::Failed(TypedFailure {
            status: 404,
            payload: CallError(Some(404)),
        });
        assert_eq!(failed.into_result().unwrap_err().unwrap().status, 404);

        let aborted: RunOutcome<u8, CallError> = RunOutcome::Aborted { last: None };
        assert!(aborted.into_result().unwrap_err().is_none());
    }
}
