// src/error.rs
// Error taxonomy shared by all stages. The retry policy consults
// `is_retryable`; everything else is caught at its stage boundary and
// converted into a FailureRecord.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out")]
    Timeout,

    #[error("invalid source configuration: {0}")]
    Config(String),

    #[error("rate limited by upstream API")]
    RateLimited,

    #[error("api error: {0}")]
    Api(String),

    #[error("malformed capability response: {0}")]
    Malformed(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("task failed: {0}")]
    Task(String),
}

impl StageError {
    /// Transient faults are retried with backoff; config mistakes and
    /// malformed responses surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StageError::Network(_)
                | StageError::Timeout
                | StageError::RateLimited
                | StageError::Api(_)
        )
    }

    /// Short stable kind tag recorded on FailureRecords.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Network(_) => "network",
            StageError::Timeout => "timeout",
            StageError::Config(_) => "config",
            StageError::RateLimited => "rate_limited",
            StageError::Api(_) => "api",
            StageError::Malformed(_) => "malformed_response",
            StageError::Sink(_) => "sink",
            StageError::Task(_) => "task",
        }
    }
}

impl From<reqwest::Error> for StageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StageError::Timeout
        } else if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                StageError::RateLimited
            } else {
                StageError::Api(format!("http status {status}"))
            }
        } else {
            StageError::Network(e.to_string())
        }
    }
}
