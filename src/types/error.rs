use thiserror::Error;
use url::Url;

/// The result of a fetch operation
pub type Result<T> = std::result::Result<T, FetchError>;

/// Possible errors when fetching through the rate-limited queue
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    /// The URL has no hostname to key the per-host queue on
    #[error("URL is missing a host: {0}")]
    MissingHost(Url),

    /// The given header could not be parsed.
    /// A possible error when converting a `HeaderValue` from a string or
    /// byte slice.
    #[error("Header could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The request client cannot be created
    #[error("Failed to build the request client")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The transport itself failed (DNS, connect, TLS, timeout at the
    /// transport layer). Connectivity failures settle a request on its
    /// very first attempt and are never retried.
    #[error("Transport error while connecting to the endpoint")]
    Transport(#[source] reqwest::Error),

    /// Every attempt in the retry budget returned a non-success status.
    /// Wraps the final response.
    #[error("Giving up after {attempts} attempts: last status {}", .response.status())]
    BudgetExhausted {
        /// How many transport attempts were made before giving up
        attempts: u32,
        /// The final non-success response
        response: reqwest::Response,
    },
}

impl FetchError {
    /// The HTTP status code of the last response, if one was received
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::Transport(e) => e.status(),
            Self::BudgetExhausted { response, .. } => Some(response.status()),
            Self::MissingHost(_) | Self::InvalidHeader(_) | Self::BuildRequestClient(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_host_display() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        let error = FetchError::MissingHost(url);
        assert_eq!(
            error.to_string(),
            "URL is missing a host: data:text/plain,hello"
        );
        assert_eq!(error.status(), None);
    }
}
