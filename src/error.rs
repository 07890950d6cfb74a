//! Error types for Threadline
//!
//! All errors in the library are converted to `StoreError`.
//! Blacklist blocks and duplicate suppression are *not* errors;
//! they are normal pipeline outcomes (see `service::ingest`).

use thiserror::Error;

/// Library-wide error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database handle could not be recovered after reopen-and-retry.
    ///
    /// Writes must surface this to the caller; reads may legitimately
    /// return empty instead.
    #[error("store unavailable after reconnect retry")]
    StoreUnavailable,

    /// Underlying database error (non-transient, or failed while reopening)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error (malformed caller input)
    #[error("validation error: {0}")]
    Validation(String),

    /// Remote mirror transport error
    ///
    /// Never fatal to a local write: the ingestion path logs these and
    /// local state stays authoritative.
    #[error("mirror error: {0}")]
    Mirror(#[from] reqwest::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        StoreError::Config(err.to_string())
    }
}

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
