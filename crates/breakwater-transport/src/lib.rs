//! HTTP transport abstraction for Breakwater
//!
//! The client layer never talks to reqwest directly. It builds an [`HttpRequest`], hands it
//! to a [`Transport`], and gets back a fully buffered [`HttpResponse`]. Transports perform
//! exactly one exchange per call; retries belong to the layer above.
//!
//! # Usage
//!
//! ```no_run
//! use breakwater_transport::{HttpRequest, HttpTransport, Transport};
//! use http::Method;
//!
//! # async fn example() -> breakwater_transport::Result<()> {
//! let transport = HttpTransport::new()?;
//! let url = url::Url::parse("https://example.com/health").unwrap();
//! let response = transport.send_http(HttpRequest::new(Method::GET, url)).await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod traits;

pub use error::{Result, TransportError};
pub use crate::http::{HttpTransport, HttpTransportConfig};
pub use traits::{HttpRequest, HttpResponse, Transport};
