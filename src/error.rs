//! Fetch error taxonomy shared by both transports.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The requested id has no record (HTTP 404, missing snapshot file).
    #[error("{what} not found")]
    NotFound { what: String },

    /// Network, IO or non-success HTTP status.
    #[error("fetch failed: {0}")]
    Transport(String),

    /// The body did not decode as the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The active transport cannot serve this operation.
    #[error("{0} is not available with the {1} transport")]
    Unsupported(&'static str, &'static str),
}

impl FetchError {
    pub fn not_found(what: impl Into<String>) -> Self {
        FetchError::NotFound { what: what.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
