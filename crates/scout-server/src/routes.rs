use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use scout_core::ingest;
use scout_core::{Category, CategoryRouter, JobQueue, LinkStore, ResultSink};

use crate::auth::require_admin_token;
use crate::dto::{
    CategoryStatsResponse, DetailsQuery, DetailsResponse, HealthResponse, IngestRequest,
    IngestResponse, StatsResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::rate_limit::enforce_rate_limit;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    // Layers run bottom-up: authentication first, so rejected callers
    // never consume rate-limit tokens.
    let api = Router::new()
        .route("/v1/ingest", post(ingest_rows))
        .route("/v1/ingest/csv", post(ingest_csv))
        .route("/v1/details/{category}", get(get_details))
        .route("/v1/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/ingest",
    request_body = IngestRequest,
    responses(
        (status = 202, description = "Discovery jobs dispatched", body = IngestResponse),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Rate limited", body = crate::dto::RateLimitResponse),
    ),
    security(("bearer" = [])),
    tag = "ingest"
)]
pub async fn ingest_rows(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let routed = CategoryRouter.route(
        body.rows
            .iter()
            .map(|row| (row.url.as_str(), row.label.as_str())),
    );
    let summary = CategoryRouter.dispatch(&state.queue, &routed).await?;

    Ok((
        StatusCode::ACCEPTED,
        axum::Json(IngestResponse::new(summary, routed.dropped)),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/ingest/csv",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 202, description = "Discovery jobs dispatched", body = IngestResponse),
        (status = 400, description = "Unreadable CSV", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Rate limited", body = crate::dto::RateLimitResponse),
    ),
    security(("bearer" = [])),
    tag = "ingest"
)]
pub async fn ingest_csv(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let rows = ingest::read_rows_from_str(&body)?;
    let routed = CategoryRouter.route(ingest::as_pairs(&rows));
    let summary = CategoryRouter.dispatch(&state.queue, &routed).await?;

    Ok((
        StatusCode::ACCEPTED,
        axum::Json(IngestResponse::new(summary, routed.dropped)),
    ))
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/details/{category}",
    params(
        ("category" = String, Path, description = "event, festival or sport"),
        DetailsQuery,
    ),
    responses(
        (status = 200, description = "Stored detail records", body = DetailsResponse),
        (status = 400, description = "Unknown category", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "details"
)]
pub async fn get_details(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(query): Query<DetailsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category: Category = category.parse()?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let sink = ResultSink::new(state.store.clone());
    let total = sink.count(category).await?;
    let records = sink.range(category, offset, limit).await?;

    Ok(axum::Json(DetailsResponse {
        category: category.to_string(),
        total,
        offset,
        limit,
        records,
    }))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/stats",
    responses(
        (status = 200, description = "Queue and link-set counts", body = StatsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "stats"
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.queue.stats().await?;

    let links = LinkStore::new(state.store.clone());
    let mut categories = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let stats = links.stats(category).await?;
        categories.push(CategoryStatsResponse::new(category.as_str(), stats));
    }

    Ok(axum::Json(StatsResponse {
        jobs: jobs.into(),
        categories,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let redis_status = match state.redis.ping().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if redis_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if redis_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        redis: redis_status,
    };

    (status, axum::Json(response))
}
