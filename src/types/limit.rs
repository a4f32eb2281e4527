use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of transport attempts before a request is deemed as
/// failed, 3
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between two calls to the same host, 100ms
pub const DEFAULT_TIME_BETWEEN_CALLS: Duration = Duration::from_millis(100);

/// Retry budget and pacing for requests to a single host.
///
/// A `RateLimit` travels with each request: either the one passed to
/// [`Client::fetch_with`](crate::Client::fetch_with) or the client's
/// default. It is immutable for the lifetime of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimit {
    /// Maximum number of transport attempts for one request.
    /// Must be at least 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum pause between two calls to the same host
    #[serde(default = "default_time_between_calls", with = "humantime_serde")]
    pub time_between_calls: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            time_between_calls: default_time_between_calls(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_time_between_calls() -> Duration {
    DEFAULT_TIME_BETWEEN_CALLS
}
