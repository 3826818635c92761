//! # gqlclient - A GraphQL-over-HTTP client
//!
//! gqlclient sends GraphQL queries and variables to an HTTP endpoint and decodes
//! the `{data, errors}` envelope into typed payloads or structured errors. Query
//! text is opaque: nothing is parsed or validated client-side.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gqlclient::{Client, Request};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Default, Deserialize)]
//! struct Item {
//!     field1: String,
//!     field2: String,
//! }
//!
//! #[derive(Default, Deserialize)]
//! struct Data {
//!     item: Item,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gqlclient::Error> {
//!     // Create a client (safe to share across requests)
//!     let client = Client::builder("https://localhost/graphql")
//!         .default_header("Authorization", "Bearer token")?
//!         .build()?;
//!
//!     // Describe one call
//!     let request = Request::new(
//!         r#"query ($key: String!) {
//!             item(id: $key) {
//!                 field1
//!                 field2
//!             }
//!         }"#,
//!     )
//!     .with_var("key", "value")
//!     .with_header("Cache-Control", "no-cache")?
//!     .with_timeout(Duration::from_secs(10));
//!
//!     let response = client.run::<Data>(&request).await?;
//!     println!("{} / {}", response.data.item.field1, response.data.item.field2);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Pluggable encoding** - single-part JSON by default, `multipart/form-data` via
//!   [`MultipartEncoder`], or any closure implementing [`RequestEncoder`]
//! - **Pluggable transport** - reqwest by default, any [`Transport`] implementation otherwise
//! - **Layered errors** - transport failures, non-compliant endpoints and GraphQL errors
//!   are distinct [`Error`] variants
//! - **Partial results** - payloads returned alongside GraphQL errors are kept on the error
//! - **Cancellation** - per-request deadlines and cancel handles via [`Cancellation`]
//! - **Automatic logging** - Structured logging with `tracing` for observability
//!
//! ## Error Handling
//!
//! A compliant endpoint answers `200 OK` and reports failures inside the envelope.
//! The status code is therefore only consulted when the body is not an envelope:
//!
//! ```no_run
//! use gqlclient::{Client, Error, Request};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::new("https://localhost/graphql")?;
//! match client.execute(&Request::new("mutation { reset }")).await {
//!     Ok(_) => println!("Done"),
//!     Err(Error::Graphql { errors, .. }) => {
//!         for error in &errors {
//!             eprintln!("{}", error); // graphql:1:12: reset: not allowed
//!         }
//!     }
//!     Err(Error::Http { status, .. }) => eprintln!("Transport-level failure: {}", status),
//!     Err(Error::BadResponse { .. }) => eprintln!("Endpoint is not GraphQL compliant"),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod cancel;
mod client;
pub mod encode;
mod error;
mod request;
pub mod response;
pub mod transport;

pub use cancel::{CancelHandle, Cancellation, Interrupted};
pub use client::{Client, ClientBuilder, DEFAULT_ACCEPT};
pub use encode::{JsonEncoder, MultipartEncoder, RequestEncoder};
pub use error::{DecodeError, EncodingError, Error, Result, TransportError};
pub use request::Request;
pub use response::{ErrorList, GraphError, Location, PathSegment, Response};
pub use transport::{ReqwestTransport, Transport};
