//! `modfetch` is a library for fetching metadata from mod registry APIs
//! (Modrinth, CurseForge and friends) without tripping their per-host
//! rate limits.
//!
//! Every request is put on a FIFO queue keyed by the target hostname.
//! Requests to the same host execute strictly one at a time with a
//! configurable pause in between, while requests to different hosts
//! proceed independently. Non-success responses are retried until the
//! per-request attempt budget is spent, and `X-RateLimit-*` response
//! headers stretch the pause whenever a host reports a nearly exhausted
//! quota.
//!
//! "Hello world" example:
//! ```no_run
//! use modfetch::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let response = modfetch::fetch("https://api.modrinth.com/v2/project/sodium").await?;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! For more specific use-cases you can build a client yourself, using the
//! [`ClientBuilder`] which grants full flexibility:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use modfetch::{ClientBuilder, RateLimit, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClientBuilder::builder()
//!         .default_rate_limit(RateLimit {
//!             max_attempts: 5,
//!             time_between_calls: Duration::from_millis(250),
//!         })
//!         .build()
//!         .client()?;
//!     let response = client.fetch("https://api.curseforge.com/v1/games").await?;
//!     assert!(response.status().is_success());
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
pub mod test_utils;

mod client;
mod host;
mod job;
mod queue;
mod scheduler;
mod types;

pub use client::{fetch, Client, ClientBuilder, DEFAULT_USER_AGENT};
pub use host::HostKey;
pub use queue::Queue;
pub use types::{
    FetchError, RateLimit, RequestOptions, Result, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_TIME_BETWEEN_CALLS,
};
