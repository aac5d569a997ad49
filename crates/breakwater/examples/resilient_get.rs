//! Example: a GET that retries through 5xx responses
//!
//! Reads its configuration from `BREAKWATER_*` variables (or a `.env` file) and fetches the
//! URL given on the command line, logging every attempt.
//!
//! Run with:
//! ```bash
//! RUST_LOG=breakwater=debug,breakwater_core=debug \
//!     cargo run -p breakwater --features trace --example resilient_get -- https://httpbin.org/status/500
//! ```

use breakwater::{ClientConfig, Error, RequestOptions, ResilientClient, ResponseAs};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    breakwater::init_tracing();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/status/500".to_string());

    let config = ClientConfig::from_env()?;
    let resilient = ResilientClient::from_config(config)?;
    let policy = resilient.executor().policy();
    println!(
        "Fetching {url} (retry on {:?}, budget {:?})",
        policy.retryable_statuses(),
        policy.total_budget()
    );

    let started = Instant::now();
    let options = RequestOptions::new().response_as(ResponseAs::Text);
    match resilient.get(&url, options).await {
        Ok(body) => println!("Success: {:?}", body.as_text()),
        Err(Error::Http(err)) => println!("Gave up with HTTP {}: {}", err.status(), err.message()),
        Err(Error::RetryExhausted { attempts, waited }) => {
            println!("Breaker stayed open: {attempts} request(s), waited {waited:?}")
        }
        Err(err) => return Err(err.into()),
    }
    println!("Took {:?}", started.elapsed());

    if let Some(breaker) = resilient.breaker() {
        println!(
            "Breaker: {} ({} failure(s))",
            breaker.state(),
            breaker.failure_count()
        );
    }

    Ok(())
}
