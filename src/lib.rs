//! # Steadfast - a resilient typed HTTP client
//!
//! Steadfast issues typed JSON requests to a remote resource service. Every
//! call runs through the same pipeline:
//!
//! ```text
//! caller ─▶ retry policy ─▶ interceptor chain ─▶ transport ─▶ network
//!                ▲                                   │
//!                └────────── classify(status) ◀──────┘
//! ```
//!
//! - the [`transport`] sends exactly one request;
//! - the [`interceptor`] chain attaches the bearer token and logs each exchange;
//! - [`classify`](mod@classify) maps the status to an [`ErrorKind`];
//! - the [`retry`] policy retries transient failures with exponential backoff.
//!
//! ## Quick Start
//!
//! ```no_run
//! use steadfast::users::{ErrorType, User, UserClient};
//! use steadfast::{ClientConfig, ErrorKind};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), steadfast::Error> {
//!     let users = UserClient::from_config(&ClientConfig::from_env()?)?;
//!
//!     users.create_user(&User::new(1, "Alice", 30)).await?;
//!     println!("{:?}", users.fetch_user(1).await?);
//!
//!     // 503 twice, then 200: succeeds on the third attempt.
//!     let user = users.fetch_with_retry(1, Some(2)).await?;
//!     println!("{:?}", user);
//!
//!     let err = users.fetch_with_error(1, ErrorType::Unauthorized).await.unwrap_err();
//!     assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
//!
//!     let err = users
//!         .fetch_with_timeout(1, Duration::from_secs(10), Duration::from_secs(2))
//!         .await
//!         .unwrap_err();
//!     assert!(err.is_timeout());
//!     Ok(())
//! }
//! ```
//!
//! ## Retry Policies
//!
//! ```no_run
//! use steadfast::{Client, RetryPolicy, RetryStrategy, retry::{RetryOn5xx, RetryOnTimeout, OrPredicate}};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), steadfast::Error> {
//! let client = Client::builder()
//!     .base_url("http://localhost:8080")?
//!     .retry_policy(
//!         RetryPolicy::new(RetryStrategy::ExponentialBackoff {
//!             initial_delay: Duration::from_millis(100),
//!             multiplier: 2.0,
//!             max_delay: Duration::from_secs(5),
//!             max_attempts: 4,
//!             jitter: true,
//!         })
//!         .with_predicate(OrPredicate::new(vec![
//!             Box::new(RetryOn5xx),
//!             Box::new(RetryOnTimeout),
//!         ])),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
mod client;
pub mod config;
mod error;
pub mod interceptor;
pub mod metadata;
mod response;
pub mod retry;
pub mod transport;
pub mod users;

pub use classify::{classify, Outcome};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, RetryConfig};
pub use error::{Error, ErrorKind, Result};
pub use response::Response;
pub use retry::{RetryPolicy, RetryPredicate, RetryStrategy};
pub use users::{User, UserClient};
