use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;
use crate::error::AppError;

/// Which stage of the pipeline a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Extract detail-page links from a listing page.
    Discovery,
    /// Extract structured records from one detail page.
    Detail,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Discovery => "discovery",
            JobKind::Detail => "detail",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" | "main" => Ok(JobKind::Discovery),
            "detail" => Ok(JobKind::Detail),
            _ => Err(AppError::Generic(format!("Unknown job kind: {s}"))),
        }
    }
}

/// A job record as held by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub category: Category,
    pub url: String,
    /// Zero-based attempt index of the next execution.
    pub attempt: u32,
    pub rate_limit_retries: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Request to enqueue a new job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub kind: JobKind,
    pub category: Category,
    pub url: String,
    pub max_attempts: Option<u32>,
}

impl NewJob {
    pub fn discovery(category: Category, url: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Discovery,
            category,
            url: url.into(),
            max_attempts: None,
        }
    }

    pub fn detail(category: Category, url: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Detail,
            category,
            url: url.into(),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Materialise the queue record, runnable immediately.
    pub fn into_job(self, default_max_attempts: u32) -> ExtractionJob {
        let now = Utc::now();
        ExtractionJob {
            id: Uuid::new_v4(),
            kind: self.kind,
            category: self.category,
            url: self.url,
            attempt: 0,
            rate_limit_retries: 0,
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts),
            enqueued_at: now,
            run_at: now,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Links returned by the extractor, before any filtering.
    pub total_links: usize,
    /// Links that were new to the link store.
    pub unique_links: usize,
    pub duplicate_links: usize,
    /// Unresolvable, non-http(s) or over the fan-out cap.
    pub dropped_links: usize,
    pub dispatched: usize,
    pub job_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailReport {
    pub event_count: usize,
    pub skipped_records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobReport {
    Discovery(DiscoveryReport),
    Detail(DetailReport),
}

/// Ask the queue to deliver the job again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRequest {
    pub delay: Duration,
    pub next_attempt: u32,
    pub rate_limit_retries: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// The extraction service answered with a non-success status.
    Status(u16),
    QuotaExhausted,
    RetriesExhausted,
    /// The job could not be executed at all (bad URL, broken store...).
    InvalidJob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalFailure {
    pub kind: TerminalKind,
    pub message: String,
}

impl fmt::Display for TerminalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TerminalKind::Status(code) => write!(f, "HTTP {code}: {}", self.message),
            TerminalKind::QuotaExhausted => write!(f, "quota exhausted: {}", self.message),
            TerminalKind::RetriesExhausted => write!(f, "retries exhausted: {}", self.message),
            TerminalKind::InvalidJob => write!(f, "invalid job: {}", self.message),
        }
    }
}

/// Result of one job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(JobReport),
    Retry(RetryRequest),
    Terminal(TerminalFailure),
}

impl JobOutcome {
    pub fn terminal(kind: TerminalKind, message: impl Into<String>) -> Self {
        JobOutcome::Terminal(TerminalFailure {
            kind,
            message: message.into(),
        })
    }
}

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval: Duration,
    /// Claims older than this are treated as abandoned and rescheduled.
    /// Must exceed the longest extraction attempt.
    pub reclaim_after: Duration,
    pub reclaim_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", &Uuid::new_v4().to_string()[..8]),
            poll_interval: Duration::from_secs(5),
            reclaim_after: Duration::from_secs(900),
            reclaim_interval: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reclaim_after(mut self, age: Duration) -> Self {
        self.reclaim_after = age;
        self
    }

    pub fn with_reclaim_interval(mut self, interval: Duration) -> Self {
        self.reclaim_interval = interval;
        self
    }
}
