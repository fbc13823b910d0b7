use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::AppError;

/// Minimal set/list key-value contract backing the link store and the
/// result sink. Every operation must be individually atomic.
pub trait KeyValueStore: Send + Sync + Clone {
    /// Add `member` to the set at `key`. Returns true if it was not present.
    fn sadd(&self, key: &str, member: &str)
    -> impl Future<Output = Result<bool, AppError>> + Send;

    fn sismember(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Remove `member` from the set at `key`. Returns true if it was present.
    fn srem(&self, key: &str, member: &str)
    -> impl Future<Output = Result<bool, AppError>> + Send;

    fn scard(&self, key: &str) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn smembers(&self, key: &str) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Append to the list at `key`. Returns the new length.
    fn rpush(&self, key: &str, value: &str)
    -> impl Future<Output = Result<u64, AppError>> + Send;

    fn llen(&self, key: &str) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Inclusive range with Redis index semantics (negative counts from the end).
    fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

#[derive(Debug, Default)]
struct Memory {
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, Vec<String>>,
}

/// In-process store for tests and single-process runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Memory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Memory) -> T) -> Result<T, AppError> {
        let mut memory = self
            .inner
            .lock()
            .map_err(|_| AppError::StoreError("memory store lock poisoned".into()))?;
        Ok(f(&mut memory))
    }
}

/// Resolve a Redis-style inclusive index range against a list length.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl KeyValueStore for MemoryStore {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.with(|m| {
            m.sets
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string())
        })
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.with(|m| m.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.with(|m| m.sets.get_mut(key).is_some_and(|s| s.remove(member)))
    }

    async fn scard(&self, key: &str) -> Result<u64, AppError> {
        self.with(|m| m.sets.get(key).map_or(0, |s| s.len() as u64))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, AppError> {
        self.with(|m| {
            m.sets
                .get(key)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, AppError> {
        self.with(|m| {
            let list = m.lists.entry(key.to_string()).or_default();
            list.push(value.to_string());
            list.len() as u64
        })
    }

    async fn llen(&self, key: &str) -> Result<u64, AppError> {
        self.with(|m| m.lists.get(key).map_or(0, |l| l.len() as u64))
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, AppError> {
        self.with(|m| {
            let Some(list) = m.lists.get(key) else {
                return Vec::new();
            };
            match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list[from..=to].to_vec(),
                None => Vec::new(),
            }
        })
    }
}
