//! Error Kinds
//!
//! A single flat error enum shared by the provider client, the build
//! pipeline, and the query engine. Library code that needs to branch on
//! failure (retry vs. give up, prune vs. halt) matches on this type;
//! orchestration code that only propagates failures upward uses
//! `anyhow::Result` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error calling provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected the request: auth failure")]
    Auth,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("data gap: {0}")]
    DataGap(String),

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("cache I/O error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("malformed cache entry: {0}")]
    CacheCorrupt(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this failure is worth retrying (transient transport/5xx/rate-limit).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::RateLimited(_))
    }

    /// The `data_gap` surfacing spec.md §7 mandates once retries are exhausted
    /// on a transient failure.
    pub fn into_data_gap(self) -> Error {
        match self {
            Error::Transport(e) => Error::DataGap(format!("transport retries exhausted: {e}")),
            Error::RateLimited(msg) => Error::DataGap(format!("rate limit retries exhausted: {msg}")),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
