use scout_core::AppError;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// Configuration for the Redis connection.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    /// Read configuration from environment variables.
    ///
    /// - `REDIS_URL` (optional, defaults to `redis://127.0.0.1:6379/0`)
    pub fn from_env() -> Result<Self, AppError> {
        let url = match std::env::var("REDIS_URL") {
            Ok(raw) if !raw.trim().is_empty() => raw,
            _ => DEFAULT_REDIS_URL.to_string(),
        };
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(AppError::ConfigError(format!(
                "Invalid REDIS_URL '{url}': must start with redis:// or rediss://"
            )));
        }
        Ok(Self { url })
    }
}
