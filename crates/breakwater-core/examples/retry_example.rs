//! Example: budgeted retries guarded by a circuit breaker
//!
//! This example demonstrates:
//! 1. A flaky endpoint that recovers within the retry budget
//! 2. A breaker that trips and spends the remaining budget on denied slots
//! 3. Cancelling a run from another task
//!
//! Run with:
//! ```bash
//! cargo run -p breakwater-core --example retry_example
//! ```

use breakwater_core::prelude::*;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
#[error("upstream returned {0}")]
struct Upstream(u16);

impl HasStatus for Upstream {
    fn status(&self) -> Option<u16> {
        Some(self.0)
    }
}

/// An endpoint that answers 503 for the first `fail_count` calls.
struct FlakyEndpoint {
    calls: AtomicU32,
    fail_count: u32,
}

impl FlakyEndpoint {
    fn new(fail_count: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_count,
        }
    }

    async fn call(&self) -> Result<&'static str, Upstream> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_count {
            println!("  Call {}: 503", call + 1);
            Err(Upstream(503))
        } else {
            println!("  Call {}: 200", call + 1);
            Ok("payload")
        }
    }
}

fn short_policy(breaker: Option<CircuitBreakerConfig>) -> Result<RetryPolicy, ConfigError> {
    let builder = RetryPolicy::builder()
        .retryable_statuses([429, 503])
        .delays([50, 100, 200].map(Duration::from_millis))
        .total_budget(Duration::from_millis(600));
    match breaker {
        Some(config) => builder.circuit_breaker(config).build(),
        None => builder.without_circuit_breaker().build(),
    }
}

async fn example_recovery() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Recovery Within Budget ===\n");

    let executor = RetryExecutor::new(short_policy(None)?);
    let endpoint = FlakyEndpoint::new(2);
    let start = Instant::now();

    let outcome = executor
        .run(|| {
            let endpoint = &endpoint;
            async move { endpoint.call().await }
        })
        .await?;

    println!("\nOutcome: {outcome:?}");
    println!("Elapsed: {:?} (expected ~150ms)", start.elapsed());
    Ok(())
}

async fn example_breaker_trips() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Breaker Trips After One Failure ===\n");

    let executor = RetryExecutor::new(short_policy(Some(CircuitBreakerConfig {
        failure_threshold: 1,
        success_threshold: 1,
        open_duration_ms: 10_000,
    }))?);
    let endpoint = FlakyEndpoint::new(u32::MAX);

    let outcome = executor
        .run(|| {
            let endpoint = &endpoint;
            async move { endpoint.call().await }
        })
        .await?;
    match outcome {
        RunOutcome::Exhausted {
            last,
            attempts,
            waited,
        } => {
            println!("\nExhausted after {attempts} call(s), waited {waited:?}");
            println!("Last failure: {:?}", last.map(|f| f.status));
        }
        other => println!("\nUnexpected outcome: {other:?}"),
    }
    if let Some(breaker) = executor.breaker() {
        println!("Breaker state: {}", breaker.state());
    }
    Ok(())
}

async fn example_cancellation() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Cancellation ===\n");

    let executor = RetryExecutor::new(short_policy(None)?);
    let endpoint = Arc::new(FlakyEndpoint::new(u32::MAX));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        println!("  Cancelling run");
        canceller.cancel();
    });

    let outcome = executor
        .run_cancellable(
            || {
                let endpoint = Arc::clone(&endpoint);
                async move { endpoint.call().await }
            },
            &token,
        )
        .await?;
    println!("\nOutcome: {outcome:?}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("==============================================");
    println!("   Breakwater Core: Retry Executor Examples");
    println!("==============================================");

    example_recovery().await?;
    example_breaker_trips().await?;
    example_cancellation().await?;

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
