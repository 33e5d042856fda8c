use serde::Serialize;
use thiserror::Error;

/// Cycle-level failure of a feed fetch.
///
/// Caught at the poller boundary and recorded on the published snapshot;
/// never surfaced to consumers as a thrown error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum FeedError {
    /// Network failure, timeout or non-2xx HTTP status
    #[error("transport error: {0}")]
    Transport(String),

    /// Top-level response body not shaped as the schema expects
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FeedError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        FeedError::Transport(err.to_string())
    }

    pub fn malformed(err: impl std::fmt::Display) -> Self {
        FeedError::MalformedResponse(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::MalformedResponse(err.to_string())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

/// A single upstream record that could not be turned into a `Match`.
///
/// Per-record and never fatal: the poller drops the record and counts it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} (raw id: {})", raw_id.as_deref().unwrap_or("<none>"))]
pub struct NormalizationError {
    pub reason: String,
    pub raw_id: Option<String>,
}

impl NormalizationError {
    pub fn new(reason: impl Into<String>, raw_id: Option<&str>) -> Self {
        NormalizationError {
            reason: reason.into(),
            raw_id: raw_id.map(str::to_string),
        }
    }
}
