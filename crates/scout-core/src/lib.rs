pub mod category;
pub mod config;
pub mod cron;
pub mod error;
pub mod export;
pub mod ingest;
pub mod job;
pub mod job_queue;
pub mod link_store;
pub mod normalize;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod router;
pub mod sink;
pub mod store;
pub mod traits;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use category::Category;
pub use config::PipelineConfig;
pub use cron::MonthlyTrigger;
pub use error::AppError;
pub use ingest::IngestRow;
pub use job::{
    ExtractionJob, JobKind, JobOutcome, JobReport, NewJob, TerminalFailure, TerminalKind,
    WorkerConfig,
};
pub use job_queue::{JobQueue, QueueStats};
pub use link_store::{LinkState, LinkStats, LinkStore, Novelty};
pub use pipeline::JobContext;
pub use rate_limiter::{ApiRateLimiter, RateLimitRejection, RateLimiter};
pub use retry::{Decision, FailureKind, RetryPolicy};
pub use router::{CategoryRouter, DispatchSummary, RoutedUrls};
pub use sink::ResultSink;
pub use store::{KeyValueStore, MemoryStore};
pub use traits::{ExtractRequest, ExtractResponse, Extractor};
pub use worker::{TracingWorkerReporter, WorkerEvent, WorkerReporter, WorkerService};
