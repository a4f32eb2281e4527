use std::sync::Arc;

use http::{header, HeaderMap, HeaderValue};
use log::debug;
use reqwest::{IntoUrl, Response};
use tokio::sync::oneshot;
use typed_builder::TypedBuilder;

use crate::job::FetchJob;
use crate::scheduler::Scheduler;
use crate::types::{FetchError, RateLimit, RequestOptions, Result};

/// Default user agent, `modfetch-x.y.z`
pub const DEFAULT_USER_AGENT: &str = concat!("modfetch/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct ClientBuilder {
    /// User-agent sent with every request.
    ///
    /// Some registry APIs reject requests without a descriptive agent, so
    /// consider setting one that identifies your application.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Set of default headers attached to every request.
    ///
    /// Typically used for API keys:
    ///
    /// ```
    /// use http::header::{HeaderMap, HeaderValue};
    /// use modfetch::ClientBuilder;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-api-key", HeaderValue::from_static("deadbeef"));
    ///
    /// let client = ClientBuilder::builder()
    ///     .custom_headers(headers)
    ///     .build()
    ///     .client()
    ///     .unwrap();
    /// ```
    custom_headers: HeaderMap,

    /// Retry budget and pacing applied to requests that don't bring their
    /// own [`RateLimit`]
    default_rate_limit: RateLimit,
}

impl Default for ClientBuilder {
    #[must_use]
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        let Self {
            user_agent,
            custom_headers: mut headers,
            default_rate_limit,
        } = self;

        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(FetchError::InvalidHeader)?,
        );

        let http = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .build()
            .map_err(FetchError::BuildRequestClient)?;

        Ok(Client {
            scheduler: Arc::new(Scheduler::new(http)),
            default_rate_limit,
        })
    }
}

/// Handle for sending rate-limited requests.
///
/// All requests issued through one `Client` share the same per-host
/// queues, so cloning is cheap and clones cooperate: a clone's request to
/// a host waits behind requests already queued for that host. Create the
/// client with [`ClientBuilder`].
#[derive(Debug, Clone)]
pub struct Client {
    /// Per-host queue registry shared by all clones
    scheduler: Arc<Scheduler>,

    /// Pacing applied when a request carries no explicit rate limit
    default_rate_limit: RateLimit,
}

impl Client {
    /// Send a `GET` request to `url` through the per-host queue.
    ///
    /// Resolves once the request finally succeeds, or once it is given up
    /// on. While queued, the request may wait behind earlier requests to
    /// the same host and behind rate limit back-off.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the URL is invalid, the connection fails, or
    /// the retry budget is spent on non-success responses.
    pub async fn fetch<T: IntoUrl>(&self, url: T) -> Result<Response> {
        self.fetch_with(url, RequestOptions::default(), None).await
    }

    /// Send a request with explicit options and an optional per-request
    /// rate limit overriding the client default.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the URL is invalid, the connection fails, or
    /// the retry budget is spent on non-success responses.
    pub async fn fetch_with<T: IntoUrl>(
        &self,
        url: T,
        options: RequestOptions,
        rate_limit: Option<RateLimit>,
    ) -> Result<Response> {
        let url = url.into_url().map_err(FetchError::Transport)?;
        let rate_limit = rate_limit.unwrap_or(self.default_rate_limit);
        debug!("queueing {} request to {url}", options.method);

        let (tx, rx) = oneshot::channel();
        let job = FetchJob::new(url, options, rate_limit, tx)?;
        self.scheduler.submit(job);

        // The sender end lives on the job, which settles exactly once on
        // the success, exhausted-budget and transport paths alike.
        rx.await.expect("fetch job dropped without settling")
    }
}

/// Convenience function for sending a one-off request with the default
/// settings.
///
/// For anything beyond a single request, build a [`Client`] once and
/// reuse it, so requests share the per-host queues and the connection
/// pool.
///
/// # Errors
///
/// Returns an `Err` if the client cannot be built, the URL is invalid,
/// the connection fails, or the retry budget is spent on non-success
/// responses.
pub async fn fetch<T: IntoUrl>(url: T) -> Result<Response> {
    let client = ClientBuilder::builder().build().client()?;
    client.fetch(url).await
}
