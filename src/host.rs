use std::fmt;
use url::Url;

use crate::types::{FetchError, Result};

/// A type-safe representation of a hostname, used as the partition key
/// for the per-host request queues.
///
/// Hostnames are normalized to lowercase so that requests to the same
/// host always land on the same queue, regardless of how the URL was
/// spelled. Subdomains are distinct keys: `api.modrinth.com` and
/// `cdn.modrinth.com` are paced independently.
///
/// # Examples
///
/// ```
/// use modfetch::HostKey;
/// use url::Url;
///
/// let url = Url::parse("https://api.modrinth.com/v2/project/sodium").unwrap();
/// let host = HostKey::try_from(&url).unwrap();
/// assert_eq!(host.as_str(), "api.modrinth.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey(String);

impl HostKey {
    /// Get the hostname as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = FetchError;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::MissingHost(url.clone()))?;

        // Normalize to lowercase for consistent lookup
        Ok(HostKey(host.to_lowercase()))
    }
}

impl From<&str> for HostKey {
    fn from(host: &str) -> Self {
        HostKey(host.to_lowercase())
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
