//! Discovery and detail job execution.
//!
//! Both job shapes share one implementation parameterised by [`Category`]:
//! the category picks the schema, the prompt and the storage namespace.
//! Failures never escape as errors. Every path ends in a [`JobOutcome`].
//! A job's own link is only touched on success or on a terminal failure.
//! Discovery records a candidate link as queued only after its detail job
//! is enqueued, so a retried discovery leaves no queued link without a job.
//! Links queued before the failure keep their jobs and are seen again as
//! new on the retry, which may dispatch a second detail job for them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::category::Category;
use crate::error::AppError;
use crate::job::{
    DetailReport, DiscoveryReport, ExtractionJob, JobKind, JobOutcome, JobReport, NewJob,
    RetryRequest, TerminalKind,
};
use crate::job_queue::JobQueue;
use crate::link_store::{LinkStore, Novelty};
use crate::normalize::{RecordValidator, normalize_record};
use crate::rate_limiter::RateLimiter;
use crate::retry::{Decision, FailureKind, RetryPolicy};
use crate::sink::ResultSink;
use crate::store::KeyValueStore;
use crate::traits::{ExtractRequest, ExtractResponse, Extractor};

/// Slack on top of the service-side timeout before the call is abandoned locally.
const CLIENT_GRACE: Duration = Duration::from_secs(30);

pub const DEFAULT_MAX_LINKS_PER_PAGE: usize = 200;

/// Everything a job needs to run. Cloned into every worker.
#[derive(Clone)]
pub struct JobContext<E, S, Q>
where
    E: Extractor,
    S: KeyValueStore,
    Q: JobQueue,
{
    extractor: E,
    links: LinkStore<S>,
    sink: ResultSink<S>,
    queue: Q,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    validator: Arc<RecordValidator>,
    max_links_per_page: usize,
}

impl<E, S, Q> JobContext<E, S, Q>
where
    E: Extractor,
    S: KeyValueStore,
    Q: JobQueue,
{
    pub fn new(
        extractor: E,
        store: S,
        queue: Q,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Result<Self, AppError> {
        Ok(Self {
            extractor,
            links: LinkStore::new(store.clone()),
            sink: ResultSink::new(store),
            queue,
            limiter,
            policy,
            validator: Arc::new(RecordValidator::new()?),
            max_links_per_page: DEFAULT_MAX_LINKS_PER_PAGE,
        })
    }

    pub fn with_max_links_per_page(mut self, max: usize) -> Self {
        self.max_links_per_page = max;
        self
    }

    pub fn links(&self) -> &LinkStore<S> {
        &self.links
    }

    pub fn sink(&self) -> &ResultSink<S> {
        &self.sink
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute(&self, job: &ExtractionJob) -> JobOutcome {
        match job.kind {
            JobKind::Discovery => self.run_discovery(job).await,
            JobKind::Detail => self.run_detail(job).await,
        }
    }

    /// Extract detail links from a listing page and fan them out as detail jobs.
    pub async fn run_discovery(&self, job: &ExtractionJob) -> JobOutcome {
        let category = job.category;
        let page = match Url::parse(&job.url) {
            Ok(page) => page,
            Err(e) => {
                return JobOutcome::terminal(
                    TerminalKind::InvalidJob,
                    format!("invalid page URL {}: {e}", job.url),
                );
            }
        };

        let response = match self
            .call_extractor(job, category.link_schema(), category.discovery_prompt())
            .await
        {
            Ok(response) => response,
            Err(e) => return self.on_failure(job, e).await,
        };
        if let Some(outcome) = status_failure(job, &response) {
            return outcome;
        }

        let raw = response
            .data
            .get("links")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut report = DiscoveryReport {
            total_links: raw.len(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for link in &raw {
            let Some(resolved) = link.as_str().and_then(|s| resolve_link(&page, s)) else {
                report.dropped_links += 1;
                continue;
            };
            if seen.insert(resolved.clone()) {
                candidates.push(resolved);
            } else {
                report.duplicate_links += 1;
            }
        }

        if candidates.len() > self.max_links_per_page {
            let excess = candidates.len() - self.max_links_per_page;
            tracing::warn!(
                url = %job.url,
                %category,
                excess,
                cap = self.max_links_per_page,
                "Discovery returned more links than the fan-out cap, dropping excess"
            );
            candidates.truncate(self.max_links_per_page);
            report.dropped_links += excess;
        }

        for link in candidates {
            match self.links.novelty(category, &link).await {
                Ok(Novelty::Duplicate) => {
                    report.duplicate_links += 1;
                    continue;
                }
                Ok(Novelty::New) => report.unique_links += 1,
                Err(e) => return self.on_failure(job, e).await,
            }
            // Enqueue before recording: a queued link must have a job behind it.
            let detail = match self.queue.enqueue(NewJob::detail(category, &link)).await {
                Ok(detail) => detail,
                Err(e) => return self.on_failure(job, e).await,
            };
            report.dispatched += 1;
            report.job_ids.push(detail.id);
            if let Err(e) = self.links.mark_queued(category, &link).await {
                return self.on_failure(job, e).await;
            }
        }

        tracing::info!(
            url = %job.url,
            %category,
            total_links = report.total_links,
            unique_links = report.unique_links,
            duplicate_links = report.duplicate_links,
            dispatched = report.dispatched,
            "Discovery finished"
        );
        JobOutcome::Completed(JobReport::Discovery(report))
    }

    /// Extract records from one detail page and persist them.
    pub async fn run_detail(&self, job: &ExtractionJob) -> JobOutcome {
        let category = job.category;
        let response = match self
            .call_extractor(job, category.detail_schema(), category.detail_prompt())
            .await
        {
            Ok(response) => response,
            Err(e) => return self.on_failure(job, e).await,
        };
        if let Some(outcome) = status_failure(job, &response) {
            return outcome;
        }

        let records = match response.data.get(category.plural()) {
            Some(Value::Array(records)) => records.clone(),
            _ => Vec::new(),
        };

        let mut report = DetailReport::default();
        for record in records {
            let Value::Object(fields) = record else {
                report.skipped_records += 1;
                continue;
            };
            let record = Value::Object(normalize_record(fields));
            if !self.validator.is_valid(&record) {
                tracing::warn!(
                    url = %job.url,
                    %category,
                    "Skipping record without title or event_link"
                );
                report.skipped_records += 1;
                continue;
            }
            // Records appended before a failure are appended again on retry.
            // See the note on `LinkStore::novelty`.
            if let Err(e) = self.sink.append(category, &record).await {
                return self.on_failure(job, e).await;
            }
            report.event_count += 1;
        }

        if let Err(e) = self.links.mark_processed(category, &job.url).await {
            return self.on_failure(job, e).await;
        }

        tracing::info!(
            url = %job.url,
            %category,
            event_count = report.event_count,
            skipped = report.skipped_records,
            "Detail extraction finished"
        );
        JobOutcome::Completed(JobReport::Detail(report))
    }

    async fn call_extractor(
        &self,
        job: &ExtractionJob,
        schema: Value,
        prompt: String,
    ) -> Result<ExtractResponse, AppError> {
        let timeout = self.policy.timeout_for(job.attempt);
        self.limiter.acquire().await;

        tracing::info!(
            url = %job.url,
            category = %job.category,
            kind = %job.kind,
            attempt = job.attempt,
            timeout_secs = timeout.as_secs(),
            "Calling extractor"
        );

        let request = ExtractRequest {
            url: job.url.clone(),
            schema,
            prompt,
            timeout,
            wait_for_content: job.category.wait_for_content(),
        };
        match tokio::time::timeout(timeout + CLIENT_GRACE, self.extractor.extract(request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(timeout.as_secs())),
        }
    }

    async fn on_failure(&self, job: &ExtractionJob, error: AppError) -> JobOutcome {
        let kind = FailureKind::classify(&error);
        let policy = self.policy.clone().with_max_attempts(job.max_attempts);

        match policy.decide(job.attempt, job.rate_limit_retries, kind) {
            Decision::Retry {
                delay,
                next_attempt,
                rate_limit_retries,
            } => {
                tracing::warn!(
                    url = %job.url,
                    category = %job.category,
                    attempt = job.attempt,
                    ?kind,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "Extraction failed, scheduling retry"
                );
                JobOutcome::Retry(RetryRequest {
                    delay,
                    next_attempt,
                    rate_limit_retries,
                    reason: error.to_string(),
                })
            }
            Decision::Exhausted => {
                let marked = match job.kind {
                    JobKind::Discovery => self.links.mark_failed_main(job.category, &job.url).await,
                    JobKind::Detail => self.links.mark_failed_detail(job.category, &job.url).await,
                };
                if let Err(store_error) = marked {
                    tracing::error!(
                        url = %job.url,
                        error = %store_error,
                        "Could not record terminal failure"
                    );
                }
                JobOutcome::terminal(
                    TerminalKind::RetriesExhausted,
                    format!("after {} attempts: {error}", job.attempt + 1),
                )
            }
            Decision::Abort => {
                tracing::error!(
                    critical = true,
                    url = %job.url,
                    category = %job.category,
                    error = %error,
                    "Extraction quota exhausted, job will not be retried"
                );
                JobOutcome::terminal(TerminalKind::QuotaExhausted, error.to_string())
            }
        }
    }
}

fn status_failure(job: &ExtractionJob, response: &ExtractResponse) -> Option<JobOutcome> {
    if response.is_success() {
        return None;
    }
    tracing::warn!(
        url = %job.url,
        category = %job.category,
        status = response.status_code,
        "Extractor returned a non-success status"
    );
    Some(JobOutcome::terminal(
        TerminalKind::Status(response.status_code),
        format!("extractor returned status {}", response.status_code),
    ))
}

/// Resolve a link against its page, keeping only http(s) URLs.
fn resolve_link(page: &Url, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let resolved = page.join(link).ok()?;
    let web = matches!(resolved.scheme(), "http" | "https") && resolved.host_str().is_some();
    web.then(|| resolved.into())
}
