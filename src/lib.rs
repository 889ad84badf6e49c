//! # imgur-rest - An asynchronous request engine for the Imgur REST API
//!
//! imgur-rest turns endpoint descriptions into HTTP exchanges. It is built on
//! top of `reqwest` and `tokio`, and handles the parts every caller would
//! otherwise write by hand: route templating, authentication headers, retries
//! with backoff, deadlines, cancellation and paging.
//!
//! ## Quick Start
//!
//! ```no_run
//! use imgur_rest::{routes::account, Client};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Debug, Deserialize)]
//! struct Account {
//!     id: u64,
//!     url: String,
//!     reputation: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), imgur_rest::Error> {
//!     let client = Client::builder()
//!         .client_id("my-client-id")
//!         .access_token("my-access-token")
//!         .build()?;
//!
//!     let account = client
//!         .action(account::GET_USER_PROFILE.compile(&["me"])?, |res| {
//!             res.data::<Account>()
//!         })
//!         .timeout(Duration::from_secs(10))
//!         .submit()
//!         .await?;
//!     println!("{} has {} reputation", account.url, account.reputation);
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Routes** - Endpoint templates with `{required}` and `(optional)` placeholders, validated at compile time
//! - **Three execution modes** - Fire-and-forget with continuations, futures, or blocking
//! - **Exactly-once completion** - Success, failure, cancellation and deadlines race safely
//! - **Retries** - Server errors retried with linear backoff, timeouts replayed once
//! - **Deadlines** - Absolute deadlines checked before every attempt
//! - **Separate pools** - Network work and caller continuations never share threads
//! - **Paging** - Page cursors with cached per-page actions
//! - **Logging** - Structured logging with `tracing`
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`]. Non-2xx responses and transport failures are
//! classified into [`Error::ErrorResponse`] with the status code, or
//! [`REQUESTER_ERROR_CODE`](error::REQUESTER_ERROR_CODE) when no response was
//! received:
//!
//! ```no_run
//! use imgur_rest::{routes::image, Client, Error};
//!
//! # fn example() -> Result<(), Error> {
//! # let client = Client::builder().client_id("my-client-id").build()?;
//! let action = client.action(image::GET_IMAGE.compile(&["aBc12"])?, |res| {
//!     res.data::<serde_json::Value>()
//! });
//!
//! match action.complete() {
//!     Ok(image) => println!("Image: {image}"),
//!     Err(Error::ErrorResponse { code: 404, .. }) => eprintln!("No such image"),
//!     Err(Error::DeserializationFailed { raw_response, serde_error, .. }) => {
//!         eprintln!("Unexpected body {raw_response}: {serde_error}");
//!     }
//!     Err(e) if e.is_requester_error() => eprintln!("Network trouble: {e}"),
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry Policies
//!
//! Configure how the requester handles server errors:
//!
//! ```no_run
//! use imgur_rest::{Client, RetryPolicy, RetryStrategy};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), imgur_rest::Error> {
//! let client = Client::builder()
//!     .client_id("my-client-id")
//!     .retry_policy(
//!         RetryPolicy::new(RetryStrategy::ExponentialBackoff {
//!             initial_delay: Duration::from_millis(100),
//!             max_delay: Duration::from_secs(5),
//!             max_retries: 5,
//!             jitter: true,
//!         })
//!         .retry_on_timeout(false),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod action;
pub mod auth;
mod body;
mod client;
pub mod clock;
pub mod error;
mod paged;
pub mod pool;
pub mod rate_limit;
mod request;
pub mod requester;
pub mod response;
pub mod retry;
pub mod route;
pub mod routes;

pub use action::{Action, Decoder, RestFuture};
pub use body::RequestBody;
pub use client::{ActionDefaults, Client, ClientBuilder};
pub use error::{Error, Result};
pub use paged::{PageParam, PagedAction};
pub use request::RequestHandle;
pub use response::Response;
pub use retry::{RetryPolicy, RetryStrategy};
pub use route::{AuthMode, CompiledRoute, Method, Route};
