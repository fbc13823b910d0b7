use thiserror::Error;

/// Application-wide error types for scout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request to the extraction service failed before a response arrived.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The extraction service answered with an error.
    #[error("Extraction error (HTTP {status_code}): {message}")]
    ExtractionError { message: String, status_code: u16 },

    /// Extraction call exceeded its allotted duration.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The extraction service rejected the call because of its own quota.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Account credits are exhausted. Never retried automatically.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Backing key-value store operation failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Job queue operation failed.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Bulk ingestion input could not be read.
    #[error("Ingest error: {0}")]
    IngestError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Unknown category label.
    #[error("Unknown category: {0}")]
    InvalidCategory(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::IngestError(err.to_string())
    }
}
