use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scout_core::{DispatchSummary, LinkStats, QueueStats};

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct IngestRowRequest {
    pub url: String,
    /// Category label: event, festival or sport (plural forms accepted).
    #[serde(rename = "type")]
    pub label: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct IngestRequest {
    pub rows: Vec<IngestRowRequest>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct IngestResponse {
    pub events: usize,
    pub festivals: usize,
    pub sports: usize,
    /// Rows skipped for an unknown type or an invalid URL.
    pub dropped: usize,
    pub job_ids: Vec<Uuid>,
}

impl IngestResponse {
    pub fn new(summary: DispatchSummary, dropped: usize) -> Self {
        Self {
            events: summary.events,
            festivals: summary.festivals,
            sports: summary.sports,
            dropped,
            job_ids: summary.job_ids,
        }
    }
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DetailsQuery {
    /// Page size, at most 100 (defaults to 20).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DetailsResponse {
    pub category: String,
    pub total: u64,
    pub offset: usize,
    pub limit: usize,
    pub records: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobStatsResponse {
    pub scheduled: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl From<QueueStats> for JobStatsResponse {
    fn from(stats: QueueStats) -> Self {
        Self {
            scheduled: stats.scheduled,
            running: stats.running,
            completed: stats.completed,
            failed: stats.failed,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategoryStatsResponse {
    pub category: String,
    pub queued: u64,
    pub processed: u64,
    pub failed_main: u64,
    pub failed_detail: u64,
    pub details: u64,
}

impl CategoryStatsResponse {
    pub fn new(category: &str, stats: LinkStats) -> Self {
        Self {
            category: category.to_string(),
            queued: stats.queued,
            processed: stats.processed,
            failed_main: stats.failed_main,
            failed_detail: stats.failed_detail,
            details: stats.details,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub jobs: JobStatsResponse,
    pub categories: Vec<CategoryStatsResponse>,
}

// ---------------------------------------------------------------------------
// Health / errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub redis: &'static str,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RateLimitResponse {
    pub error: String,
    pub message: String,
    pub retry_after_seconds: u64,
    pub requests_per_minute: u32,
}
