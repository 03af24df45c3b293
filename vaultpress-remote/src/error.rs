//! Error types for vaultpress-remote.

use std::time::Duration;

use thiserror::Error;

/// All errors that can arise from remote store operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection-level failure: DNS, TLS, reset, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote kept rate-limiting until the attempt budget ran out.
    #[error("rate limited after {attempts} attempt(s)")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status that is not "not found".
    #[error("HTTP {status} for {path}: {message}")]
    Status {
        status: u16,
        path: String,
        message: String,
    },

    /// A success response without the fields the operation depends on.
    #[error("unexpected response for {path}: {reason}")]
    Structural { path: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// The request gate was shut down.
    #[error("request gate closed")]
    GateClosed,
}

impl RemoteError {
    /// Errors worth another attempt under the retry policy.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
