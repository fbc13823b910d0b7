use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{ExtractionJob, JobOutcome, JobReport, WorkerConfig};
use crate::job_queue::JobQueue;
use crate::pipeline::JobContext;
use crate::store::KeyValueStore;
use crate::traits::Extractor;

/// Events emitted by the worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    Polling,
    JobClaimed {
        job: &'a ExtractionJob,
    },
    JobCompleted {
        job_id: Uuid,
        report: &'a JobReport,
    },
    JobRetrying {
        job_id: Uuid,
        next_attempt: u32,
        delay: Duration,
        reason: &'a str,
    },
    JobFailed {
        job_id: Uuid,
        error: &'a str,
    },
    JobsReclaimed {
        worker_id: &'a str,
        count: u64,
    },
    ShuttingDown {
        worker_id: &'a str,
        jobs_released: u64,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            WorkerEvent::Polling => {
                tracing::debug!("Polling for jobs");
            }
            WorkerEvent::JobClaimed { job } => {
                tracing::info!(
                    job_id = %job.id,
                    kind = %job.kind,
                    category = %job.category,
                    url = %job.url,
                    attempt = job.attempt,
                    "Job claimed"
                );
            }
            WorkerEvent::JobCompleted { job_id, report } => {
                tracing::info!(%job_id, ?report, "Job completed");
            }
            WorkerEvent::JobRetrying {
                job_id,
                next_attempt,
                delay,
                reason,
            } => {
                tracing::warn!(
                    %job_id,
                    next_attempt,
                    delay_secs = delay.as_secs(),
                    %reason,
                    "Job scheduled for retry"
                );
            }
            WorkerEvent::JobFailed { job_id, error } => {
                tracing::warn!(%job_id, %error, "Job failed");
            }
            WorkerEvent::JobsReclaimed { worker_id, count } => {
                tracing::warn!(%worker_id, count, "Rescheduled jobs from abandoned claims");
            }
            WorkerEvent::ShuttingDown {
                worker_id,
                jobs_released,
            } => {
                tracing::info!(%worker_id, %jobs_released, "Worker shutting down");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Worker that polls the job queue and executes extraction jobs.
pub struct WorkerService<E, S, Q>
where
    E: Extractor,
    S: KeyValueStore,
    Q: JobQueue,
{
    context: JobContext<E, S, Q>,
    config: WorkerConfig,
}

impl<E, S, Q> WorkerService<E, S, Q>
where
    E: Extractor,
    S: KeyValueStore,
    Q: JobQueue,
{
    pub fn new(context: JobContext<E, S, Q>, config: WorkerConfig) -> Self {
        Self { context, config }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Run the worker loop until cancellation.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), AppError> {
        let queue = self.context.queue();
        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
        });

        // A restart under the same id picks up what the previous run held
        match queue.release_worker_jobs(&self.config.worker_id).await {
            Ok(0) => {}
            Ok(count) => reporter.report(WorkerEvent::JobsReclaimed {
                worker_id: &self.config.worker_id,
                count,
            }),
            Err(e) => tracing::error!(error = %e, "Failed to release jobs from a previous run"),
        }

        let mut next_reclaim = Instant::now();
        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            if Instant::now() >= next_reclaim {
                self.reclaim_stale(reporter).await;
                next_reclaim = Instant::now() + self.config.reclaim_interval;
            }

            reporter.report(WorkerEvent::Polling);

            match queue.claim(&self.config.worker_id).await {
                Ok(Some(job)) => {
                    reporter.report(WorkerEvent::JobClaimed { job: &job });
                    self.process_job(&job, reporter).await;
                }
                Ok(None) => {
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval * 2) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
            }
        }

        // Graceful shutdown: hand claimed jobs back to the queue
        let released = queue
            .release_worker_jobs(&self.config.worker_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to release claimed jobs");
                0
            });

        reporter.report(WorkerEvent::ShuttingDown {
            worker_id: &self.config.worker_id,
            jobs_released: released,
        });
        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });

        Ok(())
    }

    async fn reclaim_stale<WR: WorkerReporter>(&self, reporter: &WR) {
        match self.context.queue().reclaim_stale(self.config.reclaim_after).await {
            Ok(0) => {}
            Ok(count) => reporter.report(WorkerEvent::JobsReclaimed {
                worker_id: &self.config.worker_id,
                count,
            }),
            Err(e) => tracing::error!(error = %e, "Failed to reclaim stale jobs"),
        }
    }

    async fn process_job<WR: WorkerReporter>(&self, job: &ExtractionJob, reporter: &WR) {
        let queue = self.context.queue();

        match self.context.execute(job).await {
            JobOutcome::Completed(report) => {
                reporter.report(WorkerEvent::JobCompleted {
                    job_id: job.id,
                    report: &report,
                });
                if let Err(e) = queue.complete(job).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
                }
            }
            JobOutcome::Retry(retry) => {
                reporter.report(WorkerEvent::JobRetrying {
                    job_id: job.id,
                    next_attempt: retry.next_attempt,
                    delay: retry.delay,
                    reason: &retry.reason,
                });
                if let Err(e) = queue
                    .retry(
                        job,
                        retry.delay,
                        retry.next_attempt,
                        retry.rate_limit_retries,
                        &retry.reason,
                    )
                    .await
                {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to reschedule job");
                }
            }
            JobOutcome::Terminal(failure) => {
                let error = failure.to_string();
                reporter.report(WorkerEvent::JobFailed {
                    job_id: job.id,
                    error: &error,
                });
                if let Err(e) = queue.fail(job, &error).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to mark job as failed");
                }
            }
        }
    }
}

/// Run `concurrency` workers over one shared context until cancellation.
///
/// Every worker shares the context's rate limiter, so the limit holds for
/// the whole process no matter how many workers run.
pub async fn run_workers<E, S, Q>(
    context: JobContext<E, S, Q>,
    config: WorkerConfig,
    concurrency: usize,
    cancel_token: CancellationToken,
) -> Result<(), AppError>
where
    E: Extractor + 'static,
    S: KeyValueStore + 'static,
    Q: JobQueue + 'static,
{
    let mut workers = JoinSet::new();
    for n in 0..concurrency.max(1) {
        let worker_config = config
            .clone()
            .with_worker_id(format!("{}-{n}", config.worker_id));
        let worker = WorkerService::new(context.clone(), worker_config);
        let cancel = cancel_token.clone();
        workers.spawn(async move { worker.run(cancel, &TracingWorkerReporter).await });
    }

    while let Some(joined) = workers.join_next().await {
        joined.map_err(|e| AppError::Generic(format!("Worker task panicked: {e}")))??;
    }
    Ok(())
}
