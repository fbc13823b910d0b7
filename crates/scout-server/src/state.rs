use std::sync::Arc;

use scout_core::ApiRateLimiter;
use scout_store::{Redis, RedisJobQueue, RedisStore};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub redis: Redis,
    pub store: RedisStore,
    pub queue: RedisJobQueue,
    /// Inbound admission control for the `/v1` routes.
    pub limiter: Arc<ApiRateLimiter>,
    /// Admin token for protecting `/v1` endpoints (None = endpoints disabled).
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(redis: Redis, default_max_attempts: u32, limiter: Arc<ApiRateLimiter>) -> Self {
        Self {
            store: redis.store(),
            queue: redis.job_queue(default_max_attempts),
            redis,
            limiter,
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }
}
