//! # Breakwater
//!
//! HTTP client with budgeted retries and circuit breaking:
//! - Base URL resolution and per-request settings overrides
//! - JSON, text and binary response decoding
//! - Non-2xx responses classified into typed [`HttpError`]s
//! - [`ResilientClient`] retrying retryable statuses under a wait budget, guarded by a
//!   circuit breaker
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use breakwater::{HttpClient, RequestOptions, ResilientClient, RetryPolicy};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::builder()
//!         .base_url("https://api.example.com/v1")?
//!         .build()?;
//!     let resilient = ResilientClient::new(client, RetryPolicy::default());
//!
//!     let created = resilient
//!         .post("/users", RequestOptions::new().body(json!({ "name": "Ada" })))
//!         .await?;
//!
//!     println!("{:?}", created.as_json());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use breakwater_core::retry::RetryPolicy;
pub use crate::http::{
    Body, FullResponse, RequestOptions, ResponseAs, ResponseBody, Settings, SettingsOverride,
};
pub use client::{HttpClient, HttpClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, HttpError, Result};
pub use resilient::ResilientClient;

// Module declarations
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod resilient;

#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub use observability::init_tracing;

// Re-export the layers this crate is built on
pub use async_trait::async_trait;
pub use breakwater_core;
pub use breakwater_transport;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use breakwater::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Body, CancellationToken, ClientConfig, Error, FullResponse, HttpClient, HttpError,
        RequestOptions, ResilientClient, ResponseAs, ResponseBody, Result, Settings,
    };
    pub use breakwater_core::prelude::*;
}

/// Crate version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
