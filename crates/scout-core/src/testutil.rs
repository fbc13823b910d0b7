//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::category::Category;
use crate::error::AppError;
use crate::job::{ExtractionJob, NewJob};
use crate::job_queue::{JobQueue, QueueStats};
use crate::traits::{ExtractRequest, ExtractResponse, Extractor};

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that replays queued responses and records requests.
#[derive(Clone, Default)]
pub struct MockExtractor {
    /// Each call pops the first element. If empty, returns `{}` with status 200.
    responses: Arc<Mutex<Vec<Result<ExtractResponse, AppError>>>>,
    pub requests: Arc<Mutex<Vec<ExtractRequest>>>,
}

impl MockExtractor {
    pub fn new(data: serde_json::Value) -> Self {
        Self::with_responses(vec![Ok(ExtractResponse::ok(data))])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_status(status_code: u16) -> Self {
        Self::with_responses(vec![Ok(ExtractResponse {
            status_code,
            data: json!({}),
        })])
    }

    pub fn with_responses(responses: Vec<Result<ExtractResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, response: Result<ExtractResponse, AppError>) {
        self.responses.lock().unwrap().push(response);
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Extractor for MockExtractor {
    async fn extract(&self, request: ExtractRequest) -> Result<ExtractResponse, AppError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ExtractResponse::ok(json!({})))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockJobQueue
// ---------------------------------------------------------------------------

/// Recorded retry: (job_id, delay, next_attempt, rate_limit_retries, error).
pub type RetriedJobRecord = (Uuid, Duration, u32, u32, String);

/// Recorded failure: (job_id, error).
pub type FailedJobRecord = (Uuid, String);

/// Claimed job: (worker_id, job, claimed_at).
type RunningJob = (String, ExtractionJob, DateTime<Utc>);

/// Mock job queue backed by in-memory Vecs.
#[derive(Clone, Default)]
pub struct MockJobQueue {
    scheduled: Arc<Mutex<Vec<ExtractionJob>>>,
    running: Arc<Mutex<Vec<RunningJob>>>,
    claim_error: Arc<Mutex<Option<AppError>>>,
    enqueue_limit: Arc<Mutex<Option<usize>>>,
    pub enqueued: Arc<Mutex<Vec<ExtractionJob>>>,
    pub completed: Arc<Mutex<Vec<Uuid>>>,
    pub retried: Arc<Mutex<Vec<RetriedJobRecord>>>,
    pub failed: Arc<Mutex<Vec<FailedJobRecord>>>,
    pub released_workers: Arc<Mutex<Vec<String>>>,
}

impl MockJobQueue {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queue with one job already claimed by `worker_id` at `claimed_at`.
    pub fn with_running(worker_id: &str, job: ExtractionJob, claimed_at: DateTime<Utc>) -> Self {
        let queue = Self::default();
        queue
            .running
            .lock()
            .unwrap()
            .push((worker_id.to_string(), job, claimed_at));
        queue
    }

    /// Queue with one job ready to be claimed.
    pub fn with_job(job: ExtractionJob) -> Self {
        let queue = Self::default();
        queue.scheduled.lock().unwrap().push(job);
        queue
    }

    pub fn with_claim_error(error: AppError) -> Self {
        let queue = Self::default();
        *queue.claim_error.lock().unwrap() = Some(error);
        queue
    }

    /// Accept `accepted` enqueues, then fail every later one.
    pub fn failing_enqueue_after(accepted: usize) -> Self {
        let queue = Self::default();
        *queue.enqueue_limit.lock().unwrap() = Some(accepted);
        queue
    }

    pub fn enqueued_urls(&self) -> Vec<String> {
        self.enqueued
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.url.clone())
            .collect()
    }

    fn take_running(&self, job_id: Uuid) -> Option<ExtractionJob> {
        let mut running = self.running.lock().unwrap();
        let pos = running.iter().position(|(_, j, _)| j.id == job_id)?;
        Some(running.remove(pos).1)
    }
}

impl JobQueue for MockJobQueue {
    async fn enqueue(&self, job: NewJob) -> Result<ExtractionJob, AppError> {
        if let Some(limit) = *self.enqueue_limit.lock().unwrap()
            && self.enqueued.lock().unwrap().len() >= limit
        {
            return Err(AppError::QueueError("queue unavailable".into()));
        }
        let job = job.into_job(4);
        self.enqueued.lock().unwrap().push(job.clone());
        self.scheduled.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<ExtractionJob>, AppError> {
        if let Some(e) = self.claim_error.lock().unwrap().take() {
            return Err(e);
        }

        let now = Utc::now();
        let mut scheduled = self.scheduled.lock().unwrap();
        let Some(pos) = scheduled.iter().position(|j| j.run_at <= now) else {
            return Ok(None);
        };
        let job = scheduled.remove(pos);
        self.running
            .lock()
            .unwrap()
            .push((worker_id.to_string(), job.clone(), now));
        Ok(Some(job))
    }

    async fn complete(&self, job: &ExtractionJob) -> Result<(), AppError> {
        self.take_running(job.id);
        self.completed.lock().unwrap().push(job.id);
        Ok(())
    }

    async fn retry(
        &self,
        job: &ExtractionJob,
        delay: Duration,
        next_attempt: u32,
        rate_limit_retries: u32,
        error: &str,
    ) -> Result<(), AppError> {
        self.take_running(job.id);
        self.retried.lock().unwrap().push((
            job.id,
            delay,
            next_attempt,
            rate_limit_retries,
            error.to_string(),
        ));

        let mut next = job.clone();
        next.attempt = next_attempt;
        next.rate_limit_retries = rate_limit_retries;
        next.last_error = Some(error.to_string());
        next.run_at = Utc::now() + TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        self.scheduled.lock().unwrap().push(next);
        Ok(())
    }

    async fn fail(&self, job: &ExtractionJob, error: &str) -> Result<(), AppError> {
        self.take_running(job.id);
        self.failed
            .lock()
            .unwrap()
            .push((job.id, error.to_string()));
        Ok(())
    }

    async fn release_worker_jobs(&self, worker_id: &str) -> Result<u64, AppError> {
        self.released_workers
            .lock()
            .unwrap()
            .push(worker_id.to_string());

        let mut running = self.running.lock().unwrap();
        let (mine, others): (Vec<_>, Vec<_>) =
            running.drain(..).partition(|(owner, _, _)| owner == worker_id);
        *running = others;
        let count = mine.len() as u64;
        self.scheduled
            .lock()
            .unwrap()
            .extend(mine.into_iter().map(|(_, job, _)| job));
        Ok(count)
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<u64, AppError> {
        let Some(cutoff) = TimeDelta::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut running = self.running.lock().unwrap();
        let (stale, fresh): (Vec<_>, Vec<_>) =
            running.drain(..).partition(|(_, _, claimed_at)| *claimed_at <= cutoff);
        *running = fresh;
        let count = stale.len() as u64;
        self.scheduled
            .lock()
            .unwrap()
            .extend(stale.into_iter().map(|(_, job, _)| job));
        Ok(count)
    }

    async fn stats(&self) -> Result<QueueStats, AppError> {
        Ok(QueueStats {
            scheduled: self.scheduled.lock().unwrap().len() as u64,
            running: self.running.lock().unwrap().len() as u64,
            completed: self.completed.lock().unwrap().len() as u64,
            failed: self.failed.lock().unwrap().len() as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock worker reporter that records events.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl crate::worker::WorkerReporter for MockReporter {
    fn report(&self, event: crate::worker::WorkerEvent<'_>) {
        use crate::worker::WorkerEvent;

        let label = match &event {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::Polling => "Polling",
            WorkerEvent::JobClaimed { .. } => "JobClaimed",
            WorkerEvent::JobCompleted { .. } => "JobCompleted",
            WorkerEvent::JobRetrying { .. } => "JobRetrying",
            WorkerEvent::JobFailed { .. } => "JobFailed",
            WorkerEvent::JobsReclaimed { .. } => "JobsReclaimed",
            WorkerEvent::ShuttingDown { .. } => "ShuttingDown",
            WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a runnable detail job for testing.
pub fn make_detail_job(category: Category, url: &str) -> ExtractionJob {
    NewJob::detail(category, url).into_job(4)
}

/// Create a runnable discovery job for testing.
pub fn make_discovery_job(category: Category, url: &str) -> ExtractionJob {
    NewJob::discovery(category, url).into_job(4)
}
