//! Error taxonomy for the Spotify access layer and catalog synchronization.
//!
//! Errors fall into two groups. Unit-fatal errors (authentication, rate limit
//! cooldown, exhausted retries, oversized batches) abort the running unit of
//! work; everything already persisted stays in place and the next scheduled
//! run picks up from there. Item-level errors (a single upstream failure, a
//! malformed payload, a failed row write) are logged by the enclosing batch
//! loop and the loop moves on to the next item.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Token exchange or refresh failed.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    /// Non-429 HTTP failure returned by the Web API.
    #[error("spotify request failed: {status} - {method} {url}")]
    Upstream {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    /// Upstream asked us to back off for longer than we are willing to wait.
    #[error("retry-after time is too big: {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("retry limit exceeded - {method} {url}")]
    RetryExhausted { method: String, url: String },

    #[error("too many {kind} ids: {len} > {limit}")]
    BatchTooLarge {
        kind: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error must abort the current unit of work instead of
    /// only skipping the item being processed.
    pub fn is_unit_fatal(&self) -> bool {
        matches!(
            self,
            Error::Auth { .. }
                | Error::RateLimitExceeded { .. }
                | Error::RetryExhausted { .. }
                | Error::BatchTooLarge { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
