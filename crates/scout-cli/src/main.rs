use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scout_client::FirecrawlExtractor;
use scout_core::export::export_csv;
use scout_core::ingest;
use scout_core::job::{NewJob, WorkerConfig};
use scout_core::worker::run_workers;
use scout_core::{
    Category, CategoryRouter, JobContext, JobKind, JobQueue, LinkStore, MonthlyTrigger,
    PipelineConfig, RateLimiter, ResultSink,
};
use scout_store::{Redis, RedisConfig};

#[derive(Parser)]
#[command(name = "scout", version, about = "Event, festival and sport link discovery pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run extraction workers and the monthly re-ingest trigger
    Worker {
        /// Number of concurrent workers (overrides SCOUT_WORKER_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Worker id prefix; keep it stable across restarts to resume claimed jobs
        #[arg(long, env = "SCOUT_WORKER_ID")]
        worker_id: Option<String>,

        /// Do not schedule the monthly re-ingest in this process
        #[arg(long, default_value_t = false)]
        no_cron: bool,
    },

    /// Route a CSV of (url, type) rows into discovery jobs
    Ingest {
        /// CSV file (defaults to SCOUT_INGEST_FILE)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Enqueue a single discovery or detail job
    Enqueue {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// Category: event, festival or sport
        #[arg(short, long)]
        category: Category,

        /// Job kind: discovery or detail
        #[arg(short, long, default_value = "discovery")]
        kind: JobKind,
    },

    /// Show queue and link-set counts
    Stats,

    /// Print stored detail records as JSON
    Details {
        #[arg(short, long)]
        category: Category,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Export stored detail records to CSV
    Export {
        #[arg(short, long)]
        category: Category,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Forget a link so the next discovery queues it again
    ResetLink {
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        category: Category,
    },

    /// Show remaining extraction credits
    Credits,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Worker {
            concurrency,
            worker_id,
            no_cron,
        } => {
            let redis = connect_redis().await?;
            cmd_worker(&redis, &config, concurrency, worker_id, no_cron).await?;
        }
        Commands::Ingest { file } => {
            let redis = connect_redis().await?;
            let file = file.unwrap_or_else(|| config.ingest_file.clone());
            cmd_ingest(&redis, &config, &file).await?;
        }
        Commands::Enqueue {
            url,
            category,
            kind,
        } => {
            let redis = connect_redis().await?;
            let queue = redis.job_queue(config.max_attempts);
            let new_job = match kind {
                JobKind::Discovery => NewJob::discovery(category, url),
                JobKind::Detail => NewJob::detail(category, url),
            };
            let job = queue.enqueue(new_job).await.map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", job.id);
        }
        Commands::Stats => {
            let redis = connect_redis().await?;
            cmd_stats(&redis, &config).await?;
        }
        Commands::Details {
            category,
            offset,
            limit,
        } => {
            let redis = connect_redis().await?;
            let sink = ResultSink::new(redis.store());
            let records = sink
                .range(category, offset, limit)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Export { category, output } => {
            let redis = connect_redis().await?;
            cmd_export(&redis, category, output.as_deref()).await?;
        }
        Commands::ResetLink { url, category } => {
            let redis = connect_redis().await?;
            let links = LinkStore::new(redis.store());
            let removed = links
                .reset(category, &url)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            if removed {
                println!("Reset {url}");
            } else {
                println!("{url} was not tracked for {category}");
            }
        }
        Commands::Credits => {
            let extractor = FirecrawlExtractor::from_env().map_err(|e| anyhow::anyhow!(e))?;
            let remaining = extractor
                .remaining_credits()
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{remaining}");
        }
    }

    Ok(())
}

/// Connect to Redis using REDIS_URL.
async fn connect_redis() -> Result<Redis> {
    let config = RedisConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    Redis::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to connect to Redis")
}

async fn cmd_worker(
    redis: &Redis,
    config: &PipelineConfig,
    concurrency: Option<usize>,
    worker_id: Option<String>,
    no_cron: bool,
) -> Result<()> {
    let extractor = FirecrawlExtractor::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let limiter = Arc::new(
        RateLimiter::new(config.extract_rate_limit).map_err(|e| anyhow::anyhow!(e))?,
    );
    let queue = redis.job_queue(config.max_attempts);
    let context = JobContext::new(
        extractor.clone(),
        redis.store(),
        queue.clone(),
        limiter,
        config.retry_policy(),
    )
    .map_err(|e| anyhow::anyhow!(e))?
    .with_max_links_per_page(config.max_links_per_page);

    let mut worker_config = WorkerConfig::default()
        .with_poll_interval(config.poll_interval)
        .with_reclaim_after(config.reclaim_after);
    if let Some(id) = worker_id {
        worker_config = worker_config.with_worker_id(id);
    }
    let concurrency = concurrency.unwrap_or(config.worker_concurrency);

    // Startup credit check; a failure here is not fatal
    if let Err(e) = extractor.remaining_credits().await {
        tracing::warn!(error = %e, "Could not read extraction credits");
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    tracing::info!(
        concurrency,
        rate_limit = config.extract_rate_limit,
        "Starting workers"
    );

    let trigger = MonthlyTrigger::new(redis.store(), queue, config.ingest_file.clone());
    let cron = async {
        if no_cron {
            return Ok(());
        }
        trigger.run(cancel.clone()).await
    };
    let workers = run_workers(context, worker_config, concurrency, cancel.clone());

    let (workers, cron) = tokio::join!(workers, cron);
    workers.map_err(|e| anyhow::anyhow!(e))?;
    cron.map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

async fn cmd_ingest(redis: &Redis, config: &PipelineConfig, file: &Path) -> Result<()> {
    let rows = ingest::read_rows_from_path(file).map_err(|e| anyhow::anyhow!(e))?;
    let routed = CategoryRouter.route(ingest::as_pairs(&rows));
    if routed.dropped > 0 {
        tracing::warn!(dropped = routed.dropped, "Skipped rows with unknown type or invalid URL");
    }

    let queue = redis.job_queue(config.max_attempts);
    let summary = CategoryRouter
        .dispatch(&queue, &routed)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!(
        "Dispatched {} discovery jobs (events: {}, festivals: {}, sports: {}, dropped: {})",
        summary.job_ids.len(),
        summary.events,
        summary.festivals,
        summary.sports,
        routed.dropped
    );
    Ok(())
}

async fn cmd_stats(redis: &Redis, config: &PipelineConfig) -> Result<()> {
    let queue = redis
        .job_queue(config.max_attempts)
        .stats()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "Jobs: {} scheduled, {} running, {} completed, {} failed\n",
        queue.scheduled, queue.running, queue.completed, queue.failed
    );

    let links = LinkStore::new(redis.store());
    for category in Category::ALL {
        let stats = links.stats(category).await.map_err(|e| anyhow::anyhow!(e))?;
        println!(
            "  {:<9} queued {:>6}  processed {:>6}  failed {:>4}/{:<4}  details {:>6}",
            category.to_string(),
            stats.queued,
            stats.processed,
            stats.failed_main,
            stats.failed_detail,
            stats.details
        );
    }
    Ok(())
}

async fn cmd_export(redis: &Redis, category: Category, output: Option<&Path>) -> Result<()> {
    let sink = ResultSink::new(redis.store());
    let rows = match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            export_csv(&sink, category, file).await
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let rows = export_csv(&sink, category, &mut lock).await;
            lock.flush()?;
            rows
        }
    }
    .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(rows, "Export finished");
    Ok(())
}
