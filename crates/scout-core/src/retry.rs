//! Progressive timeout and retry escalation.
//!
//! Every job attempt gets a longer extraction timeout than the previous
//! one, and every retryable failure a longer backoff before the next
//! delivery:
//!
//! ```text
//! attempt   timeout (base 120s)   backoff
//!    0            120s              60s
//!    1            180s             120s
//!    2            300s             240s
//!    3            420s             480s   (last attempt, no further retry)
//! ```

use std::time::Duration;

use crate::error::AppError;

/// Timeout multipliers per attempt index.
const TIMEOUT_MULTIPLIERS: [f64; 4] = [1.0, 1.5, 2.5, 3.5];

/// Multiplier for attempt indices beyond the table.
const FALLBACK_MULTIPLIER: f64 = 2.5;

/// Base of the exponential backoff schedule.
const BACKOFF_BASE_SECS: u64 = 60;

/// Design-level failure classes, independent of the extraction service's
/// own error vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    RateLimited,
    QuotaExhausted,
    Unclassified,
}

impl FailureKind {
    /// Classify an error, reclassifying unknown errors once by message.
    pub fn classify(error: &AppError) -> Self {
        match error {
            AppError::Timeout(_) => FailureKind::Timeout,
            AppError::RateLimitExceeded => FailureKind::RateLimited,
            AppError::QuotaExhausted(_) => FailureKind::QuotaExhausted,
            other => Self::from_message(&other.to_string()),
        }
    }

    fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("timeout") || message.contains("timed out") {
            FailureKind::Timeout
        } else if message.contains("rate limit") {
            FailureKind::RateLimited
        } else if message.contains("credit") || message.contains("insufficient") {
            FailureKind::QuotaExhausted
        } else {
            FailureKind::Unclassified
        }
    }
}

/// What a job should do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Ask the queue to redeliver after `delay`.
    Retry {
        delay: Duration,
        next_attempt: u32,
        rate_limit_retries: u32,
    },
    /// Attempt ceiling reached: perform the terminal link transition.
    Exhausted,
    /// Never retry and leave link state untouched.
    Abort,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_timeout: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Extra delay layered on top of backoff after a rate-limit rejection.
    pub rate_limit_cooldown: Duration,
    /// Rate-limit retries allowed before they start consuming attempts.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_secs(120),
            max_attempts: 4,
            rate_limit_cooldown: Duration::from_secs(5),
            max_rate_limit_retries: 4,
        }
    }
}

impl RetryPolicy {
    pub fn with_base_timeout(mut self, base: Duration) -> Self {
        self.base_timeout = base;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Extraction timeout for the given attempt index.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let multiplier = TIMEOUT_MULTIPLIERS
            .get(attempt as usize)
            .copied()
            .unwrap_or(FALLBACK_MULTIPLIER);
        self.base_timeout.mul_f64(multiplier)
    }

    /// Minimum delay before the next delivery: `60 * 2^attempt` seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_secs(BACKOFF_BASE_SECS.saturating_mul(factor))
    }

    /// True when `attempt` is the last one the ceiling allows.
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }

    pub fn decide(&self, attempt: u32, rate_limit_retries: u32, kind: FailureKind) -> Decision {
        match kind {
            FailureKind::QuotaExhausted => Decision::Abort,
            FailureKind::RateLimited if rate_limit_retries < self.max_rate_limit_retries => {
                Decision::Retry {
                    delay: self.backoff_delay(attempt) + self.rate_limit_cooldown,
                    next_attempt: attempt,
                    rate_limit_retries: rate_limit_retries + 1,
                }
            }
            FailureKind::Timeout | FailureKind::RateLimited | FailureKind::Unclassified => {
                if self.is_last_attempt(attempt) {
                    Decision::Exhausted
                } else {
                    Decision::Retry {
                        delay: self.backoff_delay(attempt),
                        next_attempt: attempt + 1,
                        rate_limit_retries,
                    }
                }
            }
        }
    }
}
