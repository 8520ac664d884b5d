use core::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Transient network or service failure.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream asked us to back off. Retried on the next scheduled cycle.
    #[error("rate limited by upstream (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The marker or path no longer exists upstream.
    #[error("not found upstream: {0}")]
    NotFound(String),

    /// The upstream answered with a body we could not decode.
    #[error("undecodable upstream response: {0}")]
    Decode(String),
}

impl Error {
    /// Short, stable name of the error kind for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
