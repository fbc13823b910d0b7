//! Delayed job queue on Redis.
//!
//! ```text
//! scout:jobs:scheduled        ZSET  job id -> run_at (ms)
//! scout:jobs:payload          HASH  job id -> job JSON (scheduled jobs)
//! scout:jobs:running:{worker} HASH  job id -> job JSON (claimed jobs)
//! scout:jobs:owner            HASH  job id -> worker id
//! scout:jobs:claimed          ZSET  job id -> claimed at (ms)
//! scout:jobs:completed        counter
//! scout:jobs:failed           counter
//! ```
//!
//! Each state change runs as one Lua script, so a job is always in exactly
//! one of scheduled / running. `ZREM` inside the claim script is the
//! ownership test. Claims older than a worker's reclaim age are moved back
//! to scheduled, which recovers jobs held by workers that died.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use scout_core::AppError;
use scout_core::job::{ExtractionJob, NewJob};
use scout_core::job_queue::{JobQueue, QueueStats};

use crate::database::store_error;

pub const SCHEDULED_KEY: &str = "scout:jobs:scheduled";
pub const PAYLOAD_KEY: &str = "scout:jobs:payload";
pub const OWNER_KEY: &str = "scout:jobs:owner";
pub const CLAIMED_KEY: &str = "scout:jobs:claimed";
pub const RUNNING_PREFIX: &str = "scout:jobs:running:";
pub const COMPLETED_KEY: &str = "scout:jobs:completed";
pub const FAILED_KEY: &str = "scout:jobs:failed";

fn running_key(worker_id: &str) -> String {
    format!("{RUNNING_PREFIX}{worker_id}")
}

/// KEYS: scheduled, payload, owner, running:{worker}, claimed
/// ARGV: now (ms), worker id
static CLAIM: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
    local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
    if #due == 0 then
        return false
    end
    local id = due[1]
    if redis.call('ZREM', KEYS[1], id) == 0 then
        return false
    end
    local payload = redis.call('HGET', KEYS[2], id)
    if not payload then
        return false
    end
    redis.call('HDEL', KEYS[2], id)
    redis.call('HSET', KEYS[4], id, payload)
    redis.call('HSET', KEYS[3], id, ARGV[2])
    redis.call('ZADD', KEYS[5], ARGV[1], id)
    return payload
",
    )
});

/// Drop a claimed job from its worker's running hash.
///
/// KEYS: owner, counter, claimed
/// ARGV: job id, running key prefix
static FINISH: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
    local worker = redis.call('HGET', KEYS[1], ARGV[1])
    if worker then
        redis.call('HDEL', ARGV[2] .. worker, ARGV[1])
        redis.call('HDEL', KEYS[1], ARGV[1])
    end
    redis.call('ZREM', KEYS[3], ARGV[1])
    redis.call('INCR', KEYS[2])
    return 1
",
    )
});

/// Move a claimed job back to the scheduled set with a new payload.
///
/// KEYS: owner, payload, scheduled, claimed
/// ARGV: job id, running key prefix, payload, run_at (ms)
static RESCHEDULE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
    local worker = redis.call('HGET', KEYS[1], ARGV[1])
    if worker then
        redis.call('HDEL', ARGV[2] .. worker, ARGV[1])
        redis.call('HDEL', KEYS[1], ARGV[1])
    end
    redis.call('ZREM', KEYS[4], ARGV[1])
    redis.call('HSET', KEYS[2], ARGV[1], ARGV[3])
    redis.call('ZADD', KEYS[3], ARGV[4], ARGV[1])
    return 1
",
    )
});

/// Return every job held by one worker to the scheduled set.
///
/// KEYS: running:{worker}, payload, scheduled, owner, claimed
/// ARGV: now (ms)
static RELEASE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
    local entries = redis.call('HGETALL', KEYS[1])
    local released = 0
    for i = 1, #entries, 2 do
        local id = entries[i]
        redis.call('HSET', KEYS[2], id, entries[i + 1])
        redis.call('ZADD', KEYS[3], ARGV[1], id)
        redis.call('HDEL', KEYS[4], id)
        redis.call('ZREM', KEYS[5], id)
        released = released + 1
    end
    redis.call('DEL', KEYS[1])
    return released
",
    )
});

/// Return every job claimed at or before a cutoff to the scheduled set.
///
/// KEYS: claimed, owner, payload, scheduled
/// ARGV: cutoff (ms), running key prefix, now (ms)
static RECLAIM: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
    local stale = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
    local reclaimed = 0
    for _, id in ipairs(stale) do
        redis.call('ZREM', KEYS[1], id)
        local worker = redis.call('HGET', KEYS[2], id)
        if worker then
            local running = ARGV[2] .. worker
            local payload = redis.call('HGET', running, id)
            redis.call('HDEL', running, id)
            redis.call('HDEL', KEYS[2], id)
            if payload then
                redis.call('HSET', KEYS[3], id, payload)
                redis.call('ZADD', KEYS[4], ARGV[3], id)
                reclaimed = reclaimed + 1
            end
        end
    end
    return reclaimed
",
    )
});

#[derive(Clone)]
pub struct RedisJobQueue {
    connection: MultiplexedConnection,
    default_max_attempts: u32,
}

impl RedisJobQueue {
    pub fn new(connection: MultiplexedConnection, default_max_attempts: u32) -> Self {
        Self {
            connection,
            default_max_attempts,
        }
    }

    /// Number of jobs currently claimed by one worker.
    pub async fn running_for(&self, worker_id: &str) -> Result<u64, AppError> {
        let mut con = self.connection.clone();
        con.hlen(running_key(worker_id))
            .await
            .map_err(|e| store_error("HLEN failed", e))
    }

    async fn finish(&self, job: &ExtractionJob, counter: &str) -> Result<(), AppError> {
        let mut con = self.connection.clone();
        FINISH
            .key(OWNER_KEY)
            .key(counter)
            .key(CLAIMED_KEY)
            .arg(job.id.to_string())
            .arg(RUNNING_PREFIX)
            .invoke_async::<()>(&mut con)
            .await
            .map_err(|e| queue_error("finish", e))
    }
}

impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: NewJob) -> Result<ExtractionJob, AppError> {
        let job = job.into_job(self.default_max_attempts);
        let payload = serde_json::to_string(&job)?;
        let id = job.id.to_string();

        let mut con = self.connection.clone();
        redis::pipe()
            .atomic()
            .hset(PAYLOAD_KEY, &id, &payload)
            .ignore()
            .zadd(SCHEDULED_KEY, &id, job.run_at.timestamp_millis())
            .ignore()
            .query_async::<()>(&mut con)
            .await
            .map_err(|e| queue_error("enqueue", e))?;

        tracing::debug!(job_id = %job.id, kind = %job.kind, url = %job.url, "Job enqueued");
        Ok(job)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<ExtractionJob>, AppError> {
        let mut con = self.connection.clone();
        let payload: Option<String> = CLAIM
            .key(SCHEDULED_KEY)
            .key(PAYLOAD_KEY)
            .key(OWNER_KEY)
            .key(running_key(worker_id))
            .key(CLAIMED_KEY)
            .arg(Utc::now().timestamp_millis())
            .arg(worker_id)
            .invoke_async(&mut con)
            .await
            .map_err(|e| queue_error("claim", e))?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(AppError::from))
            .transpose()
    }

    async fn complete(&self, job: &ExtractionJob) -> Result<(), AppError> {
        self.finish(job, COMPLETED_KEY).await
    }

    async fn retry(
        &self,
        job: &ExtractionJob,
        delay: Duration,
        next_attempt: u32,
        rate_limit_retries: u32,
        error: &str,
    ) -> Result<(), AppError> {
        let run_at = Utc::now()
            + TimeDelta::from_std(delay)
                .map_err(|e| AppError::QueueError(format!("retry delay out of range: {e}")))?;

        let mut next = job.clone();
        next.attempt = next_attempt;
        next.rate_limit_retries = rate_limit_retries;
        next.last_error = Some(error.to_string());
        next.run_at = run_at;
        let payload = serde_json::to_string(&next)?;

        let mut con = self.connection.clone();
        RESCHEDULE
            .key(OWNER_KEY)
            .key(PAYLOAD_KEY)
            .key(SCHEDULED_KEY)
            .key(CLAIMED_KEY)
            .arg(job.id.to_string())
            .arg(RUNNING_PREFIX)
            .arg(payload)
            .arg(run_at.timestamp_millis())
            .invoke_async::<()>(&mut con)
            .await
            .map_err(|e| queue_error("retry", e))
    }

    async fn fail(&self, job: &ExtractionJob, error: &str) -> Result<(), AppError> {
        tracing::debug!(job_id = %job.id, %error, "Job failed permanently");
        self.finish(job, FAILED_KEY).await
    }

    async fn release_worker_jobs(&self, worker_id: &str) -> Result<u64, AppError> {
        let mut con = self.connection.clone();
        RELEASE
            .key(running_key(worker_id))
            .key(PAYLOAD_KEY)
            .key(SCHEDULED_KEY)
            .key(OWNER_KEY)
            .key(CLAIMED_KEY)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut con)
            .await
            .map_err(|e| queue_error("release", e))
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<u64, AppError> {
        let now = Utc::now().timestamp_millis();
        let age = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);
        let mut con = self.connection.clone();
        let reclaimed: u64 = RECLAIM
            .key(CLAIMED_KEY)
            .key(OWNER_KEY)
            .key(PAYLOAD_KEY)
            .key(SCHEDULED_KEY)
            .arg(now.saturating_sub(age))
            .arg(RUNNING_PREFIX)
            .arg(now)
            .invoke_async(&mut con)
            .await
            .map_err(|e| queue_error("reclaim", e))?;

        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Rescheduled jobs with abandoned claims");
        }
        Ok(reclaimed)
    }

    async fn stats(&self) -> Result<QueueStats, AppError> {
        let mut con = self.connection.clone();
        let (scheduled, running, completed, failed): (u64, u64, Option<u64>, Option<u64>) =
            redis::pipe()
                .zcard(SCHEDULED_KEY)
                .hlen(OWNER_KEY)
                .get(COMPLETED_KEY)
                .get(FAILED_KEY)
                .query_async(&mut con)
                .await
                .map_err(|e| queue_error("stats", e))?;

        Ok(QueueStats {
            scheduled,
            running,
            completed: completed.unwrap_or(0),
            failed: failed.unwrap_or(0),
        })
    }
}

fn queue_error(op: &str, e: redis::RedisError) -> AppError {
    AppError::QueueError(format!("{op} failed: {e}"))
}
