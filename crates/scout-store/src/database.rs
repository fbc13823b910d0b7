use redis::aio::MultiplexedConnection;
use scout_core::AppError;

use crate::config::RedisConfig;
use crate::job_queue::RedisJobQueue;
use crate::kv_store::RedisStore;

pub(crate) fn store_error(context: &str, e: redis::RedisError) -> AppError {
    AppError::StoreError(format!("{context}: {e}"))
}

/// Central Redis facade: owns the multiplexed connection and vends the
/// store and queue adapters.
#[derive(Clone)]
pub struct Redis {
    connection: MultiplexedConnection,
}

impl Redis {
    pub async fn connect(config: &RedisConfig) -> Result<Self, AppError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AppError::ConfigError(format!("Invalid Redis URL: {e}")))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| store_error("Failed to connect", e))?;
        Ok(Self { connection })
    }

    /// Round-trip check used by health endpoints.
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut con = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut con)
            .await
            .map_err(|e| store_error("PING failed", e))?;
        Ok(())
    }

    /// Get a [`RedisStore`] sharing this connection.
    pub fn store(&self) -> RedisStore {
        RedisStore::new(self.connection.clone())
    }

    /// Get a [`RedisJobQueue`] sharing this connection.
    pub fn job_queue(&self, default_max_attempts: u32) -> RedisJobQueue {
        RedisJobQueue::new(self.connection.clone(), default_max_attempts)
    }
}
