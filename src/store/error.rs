//! Error type for row store access.
//!
//! Covers the failure modes of the hosted backend's row API: HTTP error
//! statuses, rate limiting, transport failures and rows that do not decode.

use thiserror::Error;

/// Errors that can occur while reading from or writing to the row store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend answered with HTTP 429.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success status (401 bad key, 404 unknown table, 5xx).
    #[error("row store error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A row came back in a shape we cannot use.
    #[error("could not decode rows: {0}")]
    Decode(String),

    /// The store cannot serve requests right now (used by test doubles and feeds).
    #[error("row store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
