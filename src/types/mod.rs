mod error;
mod limit;
mod options;

pub use error::{FetchError, Result};
pub use limit::{RateLimit, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIME_BETWEEN_CALLS};
pub use options::RequestOptions;
