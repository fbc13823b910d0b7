use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// One call to the extraction service.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub url: String,
    pub schema: serde_json::Value,
    pub prompt: String,
    pub timeout: Duration,
    /// Give lazily rendered listings extra time before extraction.
    pub wait_for_content: bool,
}

/// What the extraction service returned.
///
/// A non-2xx `status_code` is a completed call with a failed outcome, not
/// an error: jobs treat it as terminal without touching link state.
#[derive(Debug, Clone)]
pub struct ExtractResponse {
    pub status_code: u16,
    pub data: serde_json::Value,
}

impl ExtractResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status_code: 200,
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Renders a page and extracts structured JSON according to a schema.
pub trait Extractor: Send + Sync + Clone {
    /// Errors are surfaced as `AppError::Timeout`, `AppError::RateLimitExceeded`,
    /// `AppError::QuotaExhausted` or any other variant for unclassified failures.
    fn extract(
        &self,
        request: ExtractRequest,
    ) -> impl Future<Output = Result<ExtractResponse, AppError>> + Send;
}
