use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use scout_core::{ApiRateLimiter, PipelineConfig};
use scout_server::routes;
use scout_server::state::AppState;
use scout_store::{Redis, RedisConfig};

/// Upper bound for uploaded CSV bodies.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("SCOUT_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = PipelineConfig::from_env()?;
    let redis = Redis::connect(&RedisConfig::from_env()?).await?;
    let limiter = Arc::new(ApiRateLimiter::new(config.api_rate_limit)?);

    let mut state = AppState::new(redis, config.max_attempts, limiter);
    match std::env::var("SCOUT_ADMIN_TOKEN") {
        Ok(token) if !token.trim().is_empty() => state = state.with_admin_token(token),
        _ => tracing::warn!("SCOUT_ADMIN_TOKEN not set, /v1 endpoints are disabled"),
    }

    let app = routes::router(Arc::new(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
