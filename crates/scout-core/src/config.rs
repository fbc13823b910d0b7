use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::pipeline::DEFAULT_MAX_LINKS_PER_PAGE;
use crate::retry::RetryPolicy;

/// Pipeline tuning shared by the CLI and the server.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Outbound extraction calls per minute, process-wide.
    pub extract_rate_limit: u32,
    /// Inbound API requests per minute.
    pub api_rate_limit: u32,
    pub base_timeout: Duration,
    pub max_attempts: u32,
    pub max_links_per_page: usize,
    /// Standing URL list re-ingested every month.
    pub ingest_file: PathBuf,
    pub worker_concurrency: usize,
    pub poll_interval: Duration,
    /// Age after which a claimed job is presumed abandoned by a dead worker.
    pub reclaim_after: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extract_rate_limit: 10,
            api_rate_limit: 5,
            base_timeout: Duration::from_secs(120),
            max_attempts: 4,
            max_links_per_page: DEFAULT_MAX_LINKS_PER_PAGE,
            ingest_file: PathBuf::from("uploads/links.csv"),
            worker_concurrency: 2,
            poll_interval: Duration::from_secs(5),
            reclaim_after: Duration::from_secs(900),
        }
    }
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `SCOUT_EXTRACT_RATE_LIMIT` (defaults to 10)
    /// - `SCOUT_API_RATE_LIMIT` (defaults to 5)
    /// - `SCOUT_BASE_TIMEOUT_SECS` (defaults to 120)
    /// - `SCOUT_MAX_ATTEMPTS` (defaults to 4)
    /// - `SCOUT_MAX_LINKS_PER_PAGE` (defaults to 200)
    /// - `SCOUT_INGEST_FILE` (defaults to `uploads/links.csv`)
    /// - `SCOUT_WORKER_CONCURRENCY` (defaults to 2)
    /// - `SCOUT_POLL_INTERVAL_SECS` (defaults to 5)
    /// - `SCOUT_RECLAIM_AFTER_SECS` (defaults to 900)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            extract_rate_limit: positive(&lookup, "SCOUT_EXTRACT_RATE_LIMIT")?
                .unwrap_or(defaults.extract_rate_limit),
            api_rate_limit: positive(&lookup, "SCOUT_API_RATE_LIMIT")?
                .unwrap_or(defaults.api_rate_limit),
            base_timeout: positive(&lookup, "SCOUT_BASE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.base_timeout),
            max_attempts: positive(&lookup, "SCOUT_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            max_links_per_page: positive(&lookup, "SCOUT_MAX_LINKS_PER_PAGE")?
                .unwrap_or(defaults.max_links_per_page),
            ingest_file: lookup("SCOUT_INGEST_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.ingest_file),
            worker_concurrency: positive(&lookup, "SCOUT_WORKER_CONCURRENCY")?
                .unwrap_or(defaults.worker_concurrency),
            poll_interval: positive(&lookup, "SCOUT_POLL_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            reclaim_after: positive(&lookup, "SCOUT_RECLAIM_AFTER_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.reclaim_after),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_base_timeout(self.base_timeout)
            .with_max_attempts(self.max_attempts)
    }
}

/// Parse an optional variable that must be a positive integer.
fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let parsed: T = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a positive integer"
        ))
    })?;
    if parsed == T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Some(parsed))
}
