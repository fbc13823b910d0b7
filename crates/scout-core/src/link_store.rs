//! Link lifecycle per category.
//!
//! ```text
//! UNSEEN --mark_queued--> QUEUED --mark_processed-----> PROCESSED
//!                          |
//!                          +--mark_failed_detail----> FAILED_TERMINAL (also in processed)
//! ```
//!
//! Discovery checks [`LinkStore::novelty`], enqueues the detail job and only
//! then calls [`LinkStore::mark_queued`], so a queued link always has a job
//! behind it.
//!
//! Only this module mutates link membership. Nothing removes a link from
//! the processed or failed sets except [`LinkStore::reset`].

use serde::Serialize;

use crate::category::Category;
use crate::error::AppError;
use crate::store::KeyValueStore;

/// Result of offering a discovered link to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    New,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Unseen,
    Queued,
    Processed,
    FailedTerminal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub queued: u64,
    pub processed: u64,
    pub failed_main: u64,
    pub failed_detail: u64,
    pub details: u64,
}

/// Store key names for one category.
pub mod keys {
    use crate::category::Category;

    pub fn queued(category: Category) -> String {
        format!("{}_links_queue", category.as_str())
    }

    pub fn processed(category: Category) -> String {
        format!("processed_{}_links", category.as_str())
    }

    pub fn failed_main(category: Category) -> String {
        format!("failed_{}_links", category.as_str())
    }

    pub fn failed_detail(category: Category) -> String {
        format!("failed_{}_detail_links", category.as_str())
    }

    pub fn details(category: Category) -> String {
        format!("{}_details", category.plural())
    }
}

#[derive(Debug, Clone)]
pub struct LinkStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> LinkStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether a discovered link still needs a detail job.
    ///
    /// The check and the later [`LinkStore::mark_queued`] are separate
    /// commands, so two concurrent discoveries of the same link may both see
    /// `New` and dispatch two detail jobs. Detail processing is idempotent
    /// apart from the record list, which may then hold the page's records
    /// twice. A detail job retried after a partial append has the same effect.
    pub async fn novelty(&self, category: Category, url: &str) -> Result<Novelty, AppError> {
        if self.store.sismember(&keys::processed(category), url).await? {
            return Ok(Novelty::Duplicate);
        }
        Ok(Novelty::New)
    }

    /// Record a link whose detail job has been enqueued.
    pub async fn mark_queued(&self, category: Category, url: &str) -> Result<(), AppError> {
        self.store.sadd(&keys::queued(category), url).await?;
        Ok(())
    }

    pub async fn mark_processed(&self, category: Category, url: &str) -> Result<(), AppError> {
        self.store.sadd(&keys::processed(category), url).await?;
        self.store.srem(&keys::queued(category), url).await?;
        tracing::debug!(%category, %url, "Link marked processed");
        Ok(())
    }

    /// Terminal transition for a detail link.
    ///
    /// Order matters: failed, then processed, then out of the queue. A crash
    /// in between leaves the link in both queued and processed, which the
    /// next discovery treats as a duplicate.
    pub async fn mark_failed_detail(&self, category: Category, url: &str) -> Result<(), AppError> {
        self.store.sadd(&keys::failed_detail(category), url).await?;
        self.store.sadd(&keys::processed(category), url).await?;
        self.store.srem(&keys::queued(category), url).await?;
        tracing::warn!(%category, %url, "Detail link failed permanently");
        Ok(())
    }

    /// Terminal transition for a discovery (main) page.
    pub async fn mark_failed_main(&self, category: Category, url: &str) -> Result<(), AppError> {
        self.store.sadd(&keys::failed_main(category), url).await?;
        tracing::warn!(%category, %url, "Main page failed permanently");
        Ok(())
    }

    pub async fn state(&self, category: Category, url: &str) -> Result<LinkState, AppError> {
        if self.store.sismember(&keys::failed_detail(category), url).await?
            || self.store.sismember(&keys::failed_main(category), url).await?
        {
            return Ok(LinkState::FailedTerminal);
        }
        if self.store.sismember(&keys::processed(category), url).await? {
            return Ok(LinkState::Processed);
        }
        if self.store.sismember(&keys::queued(category), url).await? {
            return Ok(LinkState::Queued);
        }
        Ok(LinkState::Unseen)
    }

    /// Administrative reset so a link can be discovered again.
    ///
    /// Returns true if the link was present in any set.
    pub async fn reset(&self, category: Category, url: &str) -> Result<bool, AppError> {
        let mut removed = false;
        for key in [
            keys::failed_detail(category),
            keys::failed_main(category),
            keys::processed(category),
            keys::queued(category),
        ] {
            removed |= self.store.srem(&key, url).await?;
        }
        tracing::info!(%category, %url, removed, "Link reset");
        Ok(removed)
    }

    pub async fn failed_links(&self, category: Category) -> Result<Vec<String>, AppError> {
        let mut links = self.store.smembers(&keys::failed_main(category)).await?;
        links.extend(self.store.smembers(&keys::failed_detail(category)).await?);
        Ok(links)
    }

    pub async fn stats(&self, category: Category) -> Result<LinkStats, AppError> {
        Ok(LinkStats {
            queued: self.store.scard(&keys::queued(category)).await?,
            processed: self.store.scard(&keys::processed(category)).await?,
            failed_main: self.store.scard(&keys::failed_main(category)).await?,
            failed_detail: self.store.scard(&keys::failed_detail(category)).await?,
            details: self.store.llen(&keys::details(category)).await?,
        })
    }
}
