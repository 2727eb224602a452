use std::time::Duration;
use thiserror::Error;

/// Errors produced across the pipeline: transport, fetch, analysis, storage.
///
/// Variants map onto the error *kinds* the orchestrator dispatches on, not
/// onto the components that raise them -- a `Transport` error can surface
/// from the fetcher or from the analyst's backend call alike.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP response carrying a retryable status (429 or 5xx), with status,
    /// body, and a parsed `Retry-After` hint when present.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    /// Terminal, non-retryable source access failure (403/404). Callers
    /// swallow this locally and yield an empty result; it never fails a run.
    #[error("source access denied: HTTP {status}")]
    Access { status: u16 },

    /// Malformed RSS, JSON comment envelope, or LLM schema response. Logged
    /// and the offending item skipped; never aborts a run.
    #[error("parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// LLM invocation failed after retries or returned an invalid schema.
    #[error("analysis failed for post {post_id}: {message}")]
    Analysis { post_id: String, message: String },

    /// Signal Store call failed (including uniqueness violations).
    #[error("storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Missing or invalid configuration. Fails fast at entry, before any
    /// side effects.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation was cancelled via the cancellation flag.
    #[error("operation was cancelled")]
    Cancelled,

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Other(err.to_string())
    }
}

impl CoreError {
    /// Whether this error should be retried by the transport-level backoff
    /// loop: transient transport failures, rate limiting, and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Request(_) => true,
            CoreError::HttpError { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// `Retry-After` duration carried by this error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::HttpError { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
