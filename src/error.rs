//! Error types.

use thiserror::Error;

/// Failure reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend failed to serve the operation.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A callback-style backend dropped its completion without reporting.
    #[error(transparent)]
    Abandoned(#[from] crate::adapter::Abandoned),
}

impl CacheError {
    /// Wrap any displayable backend failure.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// A required construction option was not supplied.
    #[error("access-watch missing required option: {0}")]
    MissingOption(&'static str),

    /// A supplied option was present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The remote API could not be reached.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered with something other than what was asked for.
    /// The message is passed through verbatim.
    #[error("{0}")]
    Protocol(String),

    /// The remote API returned a body that is not valid JSON.
    #[error("failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The session cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
