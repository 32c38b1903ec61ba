//! Error types for extraction and fetching.

use thiserror::Error;

/// Page-level extraction failure
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No table on the page looked like a results table
    #[error("no results tables found")]
    NoResultsFound,
}

/// Failure of the external fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Client errors (4xx) will not succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Client(_) => false,
        }
    }
}
