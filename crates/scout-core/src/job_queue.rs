use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::error::AppError;
use crate::job::{ExtractionJob, NewJob};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Waiting to run, including delayed retries.
    pub scheduled: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Delayed, at-least-once job queue.
///
/// Implementations must hand each delivery to exactly one claimant. A job
/// that was claimed but never completed, retried or failed is redelivered
/// after [`JobQueue::release_worker_jobs`] for its worker, or once
/// [`JobQueue::reclaim_stale`] finds its claim too old.
pub trait JobQueue: Send + Sync + Clone {
    fn enqueue(&self, job: NewJob) -> impl Future<Output = Result<ExtractionJob, AppError>> + Send;

    /// Claim the next job whose `run_at` has passed.
    ///
    /// Returns `None` if no jobs are due.
    fn claim(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<Option<ExtractionJob>, AppError>> + Send;

    fn complete(&self, job: &ExtractionJob) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Reschedule a claimed job to run again after `delay`.
    fn retry(
        &self,
        job: &ExtractionJob,
        delay: Duration,
        next_attempt: u32,
        rate_limit_retries: u32,
        error: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Permanently fail a claimed job.
    fn fail(
        &self,
        job: &ExtractionJob,
        error: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Return every job held by a worker to the scheduled set (for graceful shutdown).
    fn release_worker_jobs(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Return jobs claimed more than `older_than` ago to the scheduled set.
    ///
    /// Recovers the jobs of workers that died without releasing them.
    fn reclaim_stale(
        &self,
        older_than: Duration,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn stats(&self) -> impl Future<Output = Result<QueueStats, AppError>> + Send;
}
