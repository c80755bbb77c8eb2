use thiserror::Error;

/// Application-wide error types for the executive order tracker.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a listing or article page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Summarization API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Reading or writing a persisted artifact failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// A persisted artifact changed on disk between load and commit.
    ///
    /// Raised by the optimistic check-then-append-then-verify write path
    /// when a concurrent run got there first. The commit is aborted and
    /// nothing is written.
    #[error("store conflict: artifact changed on disk (expected {expected}, found {found})")]
    StoreConflict { expected: String, found: String },

    /// No snapshot exists to publish. Fatal to the publish step only.
    #[error("no snapshot available to publish")]
    NoSnapshot,

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
