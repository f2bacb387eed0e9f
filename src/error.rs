//! Error types.
//!
//! Domain errors are typed with `thiserror`; the binary layer wraps them
//! in `anyhow` with context.

use thiserror::Error;

/// Errors raised while constructing an [`IpAddress`](crate::models::IpAddress).
///
/// This is the only failure that aborts a lookup: it happens before any
/// provider is invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The input is not an IPv4 or IPv6 literal.
    #[error("invalid IP address: {0:?}")]
    Invalid(String),

    /// The input carries an interface zone (e.g. `fe80::1%eth0`).
    #[error("zone-qualified addresses are not supported: {0:?}")]
    Zoned(String),
}

/// Failure of a single provider fetch.
///
/// These never escape the aggregator; they are rendered into the
/// provider's outcome as a string.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The shared deadline expired or the lookup was interrupted.
    #[error("lookup cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("executing request: {0}")]
    Request(String),

    #[error("unexpected status code: {0}")]
    Status(u16),

    #[error("decoding response: {0}")]
    Decode(String),

    /// The upstream answered 200 but reported a logical failure.
    #[error("API error: {0}")]
    Api(String),
}

impl ProviderError {
    /// Classify a transport error from reqwest.
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() {
            ProviderError::Connect(url.to_string())
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}
