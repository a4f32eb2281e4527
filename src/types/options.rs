use http::{HeaderMap, Method};

/// Per-request options passed alongside the URL.
///
/// The defaults mirror a plain `GET` with no extra headers and no body.
/// Headers given here are merged over the client's default headers for
/// this request only, so callers can attach endpoint-specific headers
/// (API keys, `Accept` overrides) without rebuilding the client.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method, `GET` when not set
    pub method: Method,

    /// Extra headers for this request
    pub headers: HeaderMap,

    /// Optional request body
    pub body: Option<Vec<u8>>,
}
