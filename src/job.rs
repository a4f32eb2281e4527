//! A single request's retry cycle.

use std::time::Duration;

use log::{debug, warn};
use reqwest::Response;
use tokio::sync::oneshot;
use url::Url;

use crate::host::HostKey;
use crate::types::{FetchError, RateLimit, RequestOptions, Result};

/// Rate limit headers recognized on responses. Lookup is case-insensitive.
const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Remaining-call count below which a host counts as throttled
const THROTTLE_THRESHOLD: i64 = 10;

/// Fallback reset window when the reset header is absent or unparsable
const DEFAULT_RESET_SECS: u64 = 60;

/// Channel on which a job reports its terminal outcome to the caller
pub(crate) type Reply = oneshot::Sender<Result<Response>>;

/// Outcome of a single execution attempt, consumed by the scheduler
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The endpoint answered with a success status. Terminal.
    Success(Response),
    /// Non-success status with budget left; the job goes back to the tail
    /// of its host's queue. Never surfaced to the caller.
    Retry(Response),
    /// Terminal failure: a transport fault or an exhausted retry budget
    Fatal(FetchError),
}

/// One logical request's stateful retry cycle.
///
/// Each call to [`FetchJob::execute`] performs exactly one transport
/// attempt and classifies the result. The attempt count and the throttle
/// state observed on the latest response live on the job and survive
/// re-enqueueing.
#[derive(Debug)]
pub(crate) struct FetchJob {
    host: HostKey,
    url: Url,
    options: RequestOptions,
    rate_limit: RateLimit,
    attempts: u32,
    throttled: bool,
    throttle_reset_secs: u64,
    reply: Reply,
}

impl FetchJob {
    /// Create a job for one logical request.
    ///
    /// # Errors
    ///
    /// Returns `MissingHost` if the URL has no hostname to queue under.
    pub(crate) fn new(
        url: Url,
        options: RequestOptions,
        rate_limit: RateLimit,
        reply: Reply,
    ) -> Result<Self> {
        let host = HostKey::try_from(&url)?;
        Ok(Self {
            host,
            url,
            options,
            rate_limit,
            attempts: 0,
            throttled: false,
            throttle_reset_secs: DEFAULT_RESET_SECS,
            reply,
        })
    }

    /// The hostname this job is queued under
    pub(crate) fn host(&self) -> &HostKey {
        &self.host
    }

    /// Perform exactly one transport attempt and classify the result
    pub(crate) async fn execute(&mut self, client: &reqwest::Client) -> Outcome {
        self.attempts += 1;

        let mut request = client
            .request(self.options.method.clone(), self.url.clone())
            .headers(self.options.headers.clone());
        if let Some(body) = &self.options.body {
            request = request.body(body.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            // Connectivity failures settle the job on the spot; only
            // HTTP-level non-success responses are retried.
            Err(e) => {
                warn!("transport error for {}: {e}", self.url);
                return Outcome::Fatal(FetchError::Transport(e));
            }
        };

        self.observe_rate_limit(response.headers());

        if response.status().is_success() {
            return Outcome::Success(response);
        }

        if self.attempts >= self.rate_limit.max_attempts {
            warn!(
                "giving up on {} after {} attempts (status {})",
                self.url,
                self.attempts,
                response.status()
            );
            return Outcome::Fatal(FetchError::BudgetExhausted {
                attempts: self.attempts,
                response,
            });
        }

        Outcome::Retry(response)
    }

    /// Update the throttle state from the response headers.
    ///
    /// A missing remaining-calls header leaves the previous state
    /// untouched; a present but unparsable one clears the throttle.
    fn observe_rate_limit(&mut self, headers: &http::HeaderMap) {
        let Some(value) = headers.get(RATELIMIT_REMAINING) else {
            return;
        };
        let remaining = value.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok());
        match remaining {
            Some(remaining) if remaining < THROTTLE_THRESHOLD => {
                self.throttled = true;
                self.throttle_reset_secs =
                    parse_header_value(headers, RATELIMIT_RESET).unwrap_or(DEFAULT_RESET_SECS);
                debug!(
                    "host {} close to its rate limit ({remaining} calls left), backing off for {}s",
                    self.host, self.throttle_reset_secs
                );
            }
            _ => self.throttled = false,
        }
    }

    /// How long the scheduler should wait before the next attempt on this
    /// job's host. Reflects the throttle state of the latest response, not
    /// a fixed per-policy constant.
    pub(crate) fn retry_in(&self) -> Duration {
        if self.throttled {
            // One extra second so the reset window has actually passed
            Duration::from_secs(self.throttle_reset_secs + 1)
        } else {
            self.rate_limit.time_between_calls
        }
    }

    /// Report the terminal outcome to the caller. Consumes the job, so it
    /// can fire at most once.
    pub(crate) fn settle(self, result: Result<Response>) {
        // The caller may have dropped its end; nothing left to notify then.
        let _ = self.reply.send(result);
    }
}

fn parse_header_value(headers: &http::HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use pretty_assertions::assert_eq;

    fn job(url: &str, rate_limit: RateLimit) -> (FetchJob, oneshot::Receiver<Result<Response>>) {
        let (tx, rx) = oneshot::channel();
        let job = FetchJob::new(
            Url::parse(url).expect("Expected valid URL"),
            RequestOptions::default(),
            rate_limit,
            tx,
        )
        .expect("Expected a URL with a host");
        (job, rx)
    }

    #[tokio::test]
    async fn test_success_is_terminal() {
        let mock_server = mock_server!(StatusCode::OK);
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());

        let outcome = job.execute(&reqwest::Client::new()).await;
        assert!(matches!(outcome, Outcome::Success(_)));
    }

    #[tokio::test]
    async fn test_non_success_with_budget_left_retries() {
        let mock_server = mock_server!(StatusCode::INTERNAL_SERVER_ERROR);
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());

        let outcome = job.execute(&reqwest::Client::new()).await;
        assert!(matches!(outcome, Outcome::Retry(_)));
    }

    #[tokio::test]
    async fn test_budget_exhausted_on_last_attempt() {
        let mock_server = mock_server!(StatusCode::INTERNAL_SERVER_ERROR);
        let limit = RateLimit {
            max_attempts: 2,
            time_between_calls: Duration::ZERO,
        };
        let (mut job, _rx) = job(&mock_server.uri(), limit);
        let client = reqwest::Client::new();

        assert!(matches!(job.execute(&client).await, Outcome::Retry(_)));
        match job.execute(&client).await {
            Outcome::Fatal(FetchError::BudgetExhausted { attempts, response }) => {
                assert_eq!(attempts, 2);
                assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("Expected exhausted budget, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_fatal_on_first_attempt() {
        // Grab an address that refuses connections by dropping the server.
        // A pooled `MockServer::start()` keeps its port bound after drop;
        // the builder variant shuts down on drop, releasing the port.
        let mock_server = wiremock::MockServer::builder().start().await;
        let uri = mock_server.uri();
        drop(mock_server);

        let (mut job, _rx) = job(&uri, RateLimit::default());
        let outcome = job.execute(&reqwest::Client::new()).await;
        assert!(matches!(outcome, Outcome::Fatal(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_retry_in_uses_reset_header() {
        let mock_server = mock_server!(
            StatusCode::OK,
            insert_header("x-ratelimit-remaining", "1"),
            insert_header("x-ratelimit-reset", "10")
        );
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());

        job.execute(&reqwest::Client::new()).await;
        assert_eq!(job.retry_in(), Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_retry_in_defaults_reset_to_sixty_seconds() {
        let mock_server = mock_server!(StatusCode::OK, insert_header("x-ratelimit-remaining", "1"));
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());

        job.execute(&reqwest::Client::new()).await;
        assert_eq!(job.retry_in(), Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_retry_in_defaults_on_unparsable_reset() {
        let mock_server = mock_server!(
            StatusCode::OK,
            insert_header("x-ratelimit-remaining", "1"),
            insert_header("x-ratelimit-reset", "soon")
        );
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());

        job.execute(&reqwest::Client::new()).await;
        assert_eq!(job.retry_in(), Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_retry_in_unthrottled_uses_time_between_calls() {
        let mock_server = mock_server!(
            StatusCode::OK,
            insert_header("x-ratelimit-remaining", "11"),
            insert_header("x-ratelimit-reset", "10")
        );
        let limit = RateLimit {
            max_attempts: 3,
            time_between_calls: Duration::ZERO,
        };
        let (mut job, _rx) = job(&mock_server.uri(), limit);

        job.execute(&reqwest::Client::new()).await;
        assert_eq!(job.retry_in(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_throttle_clears_once_quota_recovers() {
        let mock_server = mock_server!(
            StatusCode::OK,
            insert_header("x-ratelimit-remaining", "1"),
            insert_header("x-ratelimit-reset", "10")
        );
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());
        let client = reqwest::Client::new();

        job.execute(&client).await;
        assert_eq!(job.retry_in(), Duration::from_secs(11));

        // Same host now reports plenty of quota again
        mock_server.reset().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).insert_header("x-ratelimit-remaining", "50"),
            )
            .mount(&mock_server)
            .await;

        job.execute(&client).await;
        assert_eq!(job.retry_in(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_absent_remaining_header_keeps_previous_state() {
        let mock_server = mock_server!(
            StatusCode::OK,
            insert_header("x-ratelimit-remaining", "1"),
            insert_header("x-ratelimit-reset", "10")
        );
        let (mut job, _rx) = job(&mock_server.uri(), RateLimit::default());
        let client = reqwest::Client::new();

        job.execute(&client).await;
        assert_eq!(job.retry_in(), Duration::from_secs(11));

        // No rate limit headers at all: throttle detection is disabled
        // for this response and the previous state sticks.
        mock_server.reset().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        job.execute(&client).await;
        assert_eq!(job.retry_in(), Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_settle_resolves_the_reply_channel() {
        let mock_server = mock_server!(StatusCode::OK);
        let (mut job, rx) = job(&mock_server.uri(), RateLimit::default());

        let outcome = job.execute(&reqwest::Client::new()).await;
        match outcome {
            Outcome::Success(response) => job.settle(Ok(response)),
            other => panic!("Expected success, got {other:?}"),
        }

        let result = rx.await.expect("Expected a settled job");
        assert_eq!(result.unwrap().status(), StatusCode::OK);
    }
}
