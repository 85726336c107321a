use thiserror::Error;

use crate::types::ListingId;

#[derive(Debug, Error)]
pub enum Error {
    /// Contradictory or empty query, bad paging. Never retried.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Some fused ids could not be hydrated; the rest of the page is intact.
    #[error("Partial result: {} listing(s) could not be resolved", missing.len())]
    PartialResult { missing: Vec<ListingId> },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for errors caused by the caller's input (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidQuery(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an embedding provider adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed request: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transient failures are worth retrying; auth and malformed input are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) | ProviderError::Timeout(_) | ProviderError::Unavailable(_)
        )
    }
}
