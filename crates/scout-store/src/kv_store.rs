use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use scout_core::AppError;
use scout_core::store::KeyValueStore;

use crate::database::store_error;

/// [`KeyValueStore`] over plain Redis set and list commands.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }
}

impl KeyValueStore for RedisStore {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, AppError> {
        let mut con = self.connection.clone();
        let added: u64 = con
            .sadd(key, member)
            .await
            .map_err(|e| store_error("SADD failed", e))?;
        Ok(added > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, AppError> {
        let mut con = self.connection.clone();
        con.sismember(key, member)
            .await
            .map_err(|e| store_error("SISMEMBER failed", e))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, AppError> {
        let mut con = self.connection.clone();
        let removed: u64 = con
            .srem(key, member)
            .await
            .map_err(|e| store_error("SREM failed", e))?;
        Ok(removed > 0)
    }

    async fn scard(&self, key: &str) -> Result<u64, AppError> {
        let mut con = self.connection.clone();
        con.scard(key)
            .await
            .map_err(|e| store_error("SCARD failed", e))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, AppError> {
        let mut con = self.connection.clone();
        con.smembers(key)
            .await
            .map_err(|e| store_error("SMEMBERS failed", e))
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, AppError> {
        let mut con = self.connection.clone();
        con.rpush(key, value)
            .await
            .map_err(|e| store_error("RPUSH failed", e))
    }

    async fn llen(&self, key: &str) -> Result<u64, AppError> {
        let mut con = self.connection.clone();
        con.llen(key)
            .await
            .map_err(|e| store_error("LLEN failed", e))
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, AppError> {
        let mut con = self.connection.clone();
        con.lrange(key, start, stop)
            .await
            .map_err(|e| store_error("LRANGE failed", e))
    }
}
