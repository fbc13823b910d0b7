//! Token-bucket rate limiting for outbound extraction calls and inbound
//! API admission.
//!
//! Two variants share the same lazy refill (no background timer, tokens
//! are recomputed from elapsed time on each call):
//!
//! - [`RateLimiter`] suspends the caller until a token is available. One
//!   instance is shared by every job in the process, which makes it the
//!   back-pressure point of the whole pipeline.
//! - [`ApiRateLimiter`] never waits. When the bucket runs dry it rejects
//!   and keeps rejecting for a full [`COOLDOWN_WINDOW`] before the bucket
//!   is refilled.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;

/// How long the API limiter keeps rejecting once it has been exhausted.
pub const COOLDOWN_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    last_update: Instant,
}

impl Bucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            capacity: f64::from(capacity),
            tokens: f64::from(capacity),
            last_update: now,
        }
    }

    /// Tokens regained per second.
    fn refill_rate(&self) -> f64 {
        self.capacity / 60.0
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate()).min(self.capacity);
        self.last_update = now;
    }

    /// Time until one whole token is available.
    fn time_to_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate())
    }
}

fn validate_rate(requests_per_minute: u32) -> Result<(), AppError> {
    if requests_per_minute == 0 {
        return Err(AppError::ConfigError(
            "Rate limit must be at least 1 request per minute".into(),
        ));
    }
    Ok(())
}

/// Cooperative token bucket gating every outbound extraction call.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Result<Self, AppError> {
        validate_rate(requests_per_minute)?;
        tracing::info!(
            requests_per_minute,
            interval_secs = 60.0 / f64::from(requests_per_minute),
            "Extraction rate limiter initialised"
        );
        Ok(Self {
            requests_per_minute,
            bucket: Mutex::new(Bucket::full(requests_per_minute, Instant::now())),
        })
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Wait for a token and consume it. Never fails.
    ///
    /// The lock is held across the wait, so concurrent callers queue up
    /// behind each other.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now());

        if bucket.tokens < 1.0 {
            let wait = bucket.time_to_next_token();
            tracing::warn!(
                wait_ms = %wait.as_millis(),
                "Extraction rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
            bucket.tokens = 1.0;
            bucket.last_update = Instant::now();
        }

        bucket.tokens -= 1.0;
        let remaining = bucket.tokens.floor() as u32;
        if remaining <= 3 {
            tracing::info!(
                remaining,
                capacity = self.requests_per_minute,
                "Extraction rate limiter low on tokens"
            );
        }
    }

    /// Whole tokens currently available (after refill).
    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now());
        bucket.tokens.floor() as u32
    }
}

/// Rejection returned by [`ApiRateLimiter::try_acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRejection {
    /// How long the caller should wait before trying again.
    pub retry_after: Duration,
    pub requests_per_minute: u32,
}

#[derive(Debug)]
struct ApiState {
    bucket: Bucket,
    /// When the bucket was last found empty. Set while the cool-down is active.
    exhausted_at: Option<Instant>,
}

/// Non-blocking token bucket for inbound API requests.
#[derive(Debug)]
pub struct ApiRateLimiter {
    requests_per_minute: u32,
    state: StdMutex<ApiState>,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Result<Self, AppError> {
        validate_rate(requests_per_minute)?;
        tracing::info!(requests_per_minute, "API rate limiter initialised");
        Ok(Self {
            requests_per_minute,
            state: StdMutex::new(ApiState {
                bucket: Bucket::full(requests_per_minute, Instant::now()),
                exhausted_at: None,
            }),
        })
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Admit the request or reject it with a retry-after hint.
    pub fn try_acquire(&self) -> Result<(), RateLimitRejection> {
        self.admit(Instant::now())
    }

    fn admit(&self, now: Instant) -> Result<(), RateLimitRejection> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(hit) = state.exhausted_at {
            let elapsed = now.saturating_duration_since(hit);
            if elapsed >= COOLDOWN_WINDOW {
                tracing::info!("API rate limit window expired, resetting tokens");
                state.bucket = Bucket::full(self.requests_per_minute, now);
                state.exhausted_at = None;
            } else {
                let retry_after = (COOLDOWN_WINDOW - elapsed).as_secs() + 1;
                tracing::warn!(retry_after, "API rate limit still active, rejecting");
                return Err(self.rejection(Duration::from_secs(retry_after)));
            }
        }

        state.bucket.refill(now);

        if state.bucket.tokens < 1.0 {
            state.exhausted_at = Some(now);
            tracing::warn!(
                retry_after = COOLDOWN_WINDOW.as_secs(),
                "API rate limit exceeded, rejecting"
            );
            return Err(self.rejection(COOLDOWN_WINDOW));
        }

        state.bucket.tokens -= 1.0;
        let remaining = state.bucket.tokens.floor() as u32;
        if remaining <= 2 {
            tracing::info!(
                remaining,
                capacity = self.requests_per_minute,
                "API rate limiter low on tokens"
            );
        }
        Ok(())
    }

    fn rejection(&self, retry_after: Duration) -> RateLimitRejection {
        RateLimitRejection {
            retry_after,
            requests_per_minute: self.requests_per_minute,
        }
    }
}
