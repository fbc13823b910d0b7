use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::category::Category;
use crate::error::AppError;
use crate::job::NewJob;
use crate::job_queue::JobQueue;

/// URLs split by category, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutedUrls {
    pub events: Vec<String>,
    pub festivals: Vec<String>,
    pub sports: Vec<String>,
    /// Rows with an unknown label or an invalid URL.
    pub dropped: usize,
}

impl RoutedUrls {
    pub fn for_category(&self, category: Category) -> &[String] {
        match category {
            Category::Event => &self.events,
            Category::Festival => &self.festivals,
            Category::Sport => &self.sports,
        }
    }

    fn push(&mut self, category: Category, url: String) {
        match category {
            Category::Event => self.events.push(url),
            Category::Festival => self.festivals.push(url),
            Category::Sport => self.sports.push(url),
        }
    }

    pub fn total(&self) -> usize {
        self.events.len() + self.festivals.len() + self.sports.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub events: usize,
    pub festivals: usize,
    pub sports: usize,
    pub job_ids: Vec<Uuid>,
}

/// Fans `(url, type label)` rows out into per-category discovery pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryRouter;

impl CategoryRouter {
    pub fn route<I, U, L>(&self, rows: I) -> RoutedUrls
    where
        I: IntoIterator<Item = (U, L)>,
        U: AsRef<str>,
        L: AsRef<str>,
    {
        let mut routed = RoutedUrls::default();
        for (url, label) in rows {
            let url = url.as_ref().trim();
            let label = label.as_ref();

            let Some(category) = Category::from_label(label) else {
                tracing::warn!(%url, %label, "Unknown type label, dropping row");
                routed.dropped += 1;
                continue;
            };
            if !is_web_url(url) {
                tracing::warn!(%url, %category, "Invalid URL, dropping row");
                routed.dropped += 1;
                continue;
            }
            routed.push(category, url.to_string());
        }

        tracing::info!(
            events = routed.events.len(),
            festivals = routed.festivals.len(),
            sports = routed.sports.len(),
            dropped = routed.dropped,
            "Routed URLs"
        );
        routed
    }

    /// Enqueue one discovery job per routed URL. Does not wait for the jobs.
    pub async fn dispatch<Q: JobQueue>(
        &self,
        queue: &Q,
        routed: &RoutedUrls,
    ) -> Result<DispatchSummary, AppError> {
        let mut summary = DispatchSummary::default();
        for category in Category::ALL {
            for url in routed.for_category(category) {
                let job = queue.enqueue(NewJob::discovery(category, url)).await?;
                summary.job_ids.push(job.id);
                match category {
                    Category::Event => summary.events += 1,
                    Category::Festival => summary.festivals += 1,
                    Category::Sport => summary.sports += 1,
                }
            }
        }
        tracing::info!(
            events = summary.events,
            festivals = summary.festivals,
            sports = summary.sports,
            "Dispatched discovery jobs"
        );
        Ok(summary)
    }
}

fn is_web_url(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|u| {
        matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty())
    })
}
