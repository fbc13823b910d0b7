//! Monthly re-ingestion of the standing URL list.
//!
//! Fires at 00:00 UTC on day 30 of every month, or on the last day of
//! months shorter than that. Every worker process runs a trigger; the run
//! key claimed in the backing store makes sure only one of them dispatches.
//! A run that does not dispatch gives its claim back.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::ingest;
use crate::job_queue::JobQueue;
use crate::router::{CategoryRouter, DispatchSummary};
use crate::store::KeyValueStore;

pub const FIRE_DAY: u32 = 30;

/// Attempts per monthly firing before waiting for the next month.
pub const FIRE_ATTEMPTS: u32 = 3;

pub const FIRE_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Set holding one member per month that has already been re-ingested.
pub const RUNS_KEY: &str = "scout:auto_ingest_runs";

pub fn run_key(at: DateTime<Utc>) -> String {
    format!("auto_ingest:{}", at.format("%Y-%m"))
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    next.pred_opt().map(|d| d.day())
}

fn fire_time(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let day = FIRE_DAY.min(last_day_of_month(year, month)?);
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// First firing strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let this_month = fire_time(now.year(), now.month())?;
    if this_month > now {
        return Some(this_month);
    }
    let next = now.date_naive().with_day(1)?.checked_add_months(Months::new(1))?;
    fire_time(next.year(), next.month())
}

pub struct MonthlyTrigger<S, Q>
where
    S: KeyValueStore,
    Q: JobQueue,
{
    store: S,
    queue: Q,
    file: PathBuf,
}

impl<S, Q> MonthlyTrigger<S, Q>
where
    S: KeyValueStore,
    Q: JobQueue,
{
    pub fn new(store: S, queue: Q, file: impl Into<PathBuf>) -> Self {
        Self {
            store,
            queue,
            file: file.into(),
        }
    }

    /// Re-ingest the standing list for the month of `at`.
    ///
    /// Returns `None` when another process already claimed this month or
    /// the file is missing. Unless jobs were dispatched the claim is
    /// released, so the month can be fired again. A dispatch that failed
    /// part-way may then enqueue some discovery jobs twice.
    pub async fn fire(&self, at: DateTime<Utc>) -> Result<Option<DispatchSummary>, AppError> {
        let key = run_key(at);
        if !self.store.sadd(RUNS_KEY, &key).await? {
            tracing::info!(run = %key, "Monthly ingest already claimed, skipping");
            return Ok(None);
        }

        let result = self.ingest(&key).await;
        if !matches!(result, Ok(Some(_)))
            && let Err(e) = self.store.srem(RUNS_KEY, &key).await
        {
            tracing::error!(run = %key, error = %e, "Could not release monthly ingest claim");
        }
        result
    }

    async fn ingest(&self, key: &str) -> Result<Option<DispatchSummary>, AppError> {
        if !self.file.exists() {
            tracing::warn!(file = %self.file.display(), "Ingest file not found, skipping monthly run");
            return Ok(None);
        }

        let rows = ingest::read_rows_from_path(&self.file)?;
        let routed = CategoryRouter.route(ingest::as_pairs(&rows));
        let summary = CategoryRouter.dispatch(&self.queue, &routed).await?;
        tracing::info!(
            run = %key,
            events = summary.events,
            festivals = summary.festivals,
            sports = summary.sports,
            "Monthly ingest dispatched"
        );
        Ok(Some(summary))
    }

    /// Sleep until each firing and re-ingest, until cancelled.
    pub async fn run(&self, cancel_token: CancellationToken) -> Result<(), AppError> {
        loop {
            let now = Utc::now();
            let next = next_run_after(now)
                .ok_or_else(|| AppError::Generic("cannot compute next monthly run".into()))?;
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next_run = %next, "Monthly ingest scheduled");

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = cancel_token.cancelled() => return Ok(()),
            }

            for attempt in 1..=FIRE_ATTEMPTS {
                let Err(e) = self.fire(next).await else {
                    break;
                };
                tracing::error!(error = %e, attempt, "Monthly ingest failed");
                if attempt == FIRE_ATTEMPTS {
                    break;
                }
                tokio::select! {
                    () = tokio::time::sleep(FIRE_RETRY_DELAY) => {}
                    () = cancel_token.cancelled() => return Ok(()),
                }
            }
        }
    }
}
