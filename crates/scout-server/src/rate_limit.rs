use std::sync::Arc;

use axum::extract::State;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::dto::RateLimitResponse;
use crate::state::AppState;

/// Middleware that admits requests through the shared [`scout_core::ApiRateLimiter`].
///
/// Rejections carry a `Retry-After` header with the remaining cool-down.
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(rejection) = state.limiter.try_acquire() {
        let retry_after = rejection.retry_after.as_secs();
        let body = RateLimitResponse {
            error: "rate_limit_exceeded".to_string(),
            message: format!("Too many requests. Try again in {retry_after} seconds."),
            retry_after_seconds: retry_after,
            requests_per_minute: rejection.requests_per_minute,
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    next.run(request).await
}
