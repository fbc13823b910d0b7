use serde_json::Value;

use crate::category::Category;
use crate::error::AppError;
use crate::link_store::keys;
use crate::store::KeyValueStore;

/// Append-only store of extracted detail records, one list per category.
#[derive(Debug, Clone)]
pub struct ResultSink<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ResultSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn append(
        &self,
        category: Category,
        record: &Value,
    ) -> Result<u64, AppError> {
        let encoded = serde_json::to_string(record)?;
        self.store.rpush(&keys::details(category), &encoded).await
    }

    pub async fn count(&self, category: Category) -> Result<u64, AppError> {
        self.store.llen(&keys::details(category)).await
    }

    /// Records in insertion order, starting at `offset`.
    pub async fn range(
        &self,
        category: Category,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let start = offset as isize;
        let stop = start + limit as isize - 1;
        let raw = self
            .store
            .lrange(&keys::details(category), start, stop)
            .await?;
        decode(raw)
    }

    pub async fn all(&self, category: Category) -> Result<Vec<Value>, AppError> {
        let raw = self.store.lrange(&keys::details(category), 0, -1).await?;
        decode(raw)
    }
}

fn decode(raw: Vec<String>) -> Result<Vec<Value>, AppError> {
    raw.iter()
        .map(|s| serde_json::from_str(s).map_err(AppError::from))
        .collect()
}
