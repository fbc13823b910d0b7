use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use scout_core::{Category, JobQueue, ResultSink};

use crate::common::{
    TEST_ADMIN_TOKEN, setup_test_app, setup_test_app_no_auth, setup_test_app_with_rate_limit,
};

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["redis"], "ok");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/v1/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_token_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/v1/stats")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_admin_token_returns_403() {
    let app = setup_test_app_no_auth().await;

    let response = app
        .router
        .oneshot(
            Request::get("/v1/stats")
                .header("authorization", "Bearer any-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = json_body(response).await;
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn ingest_rows_dispatches_discovery_jobs() {
    let app = setup_test_app().await;

    let body = serde_json::json!({
        "rows": [
            {"url": "https://a.io/events", "type": "event"},
            {"url": "https://b.io/festivals", "type": "Festivals"},
            {"url": "https://c.io/concerts", "type": "concert"},
            {"url": "not a url", "type": "sport"}
        ]
    });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/v1/ingest")
                .header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["events"], 1);
    assert_eq!(json["festivals"], 1);
    assert_eq!(json["sports"], 0);
    assert_eq!(json["dropped"], 2);
    assert_eq!(json["job_ids"].as_array().unwrap().len(), 2);

    let stats = app.redis.job_queue(4).stats().await.unwrap();
    assert_eq!(stats.scheduled, 2);
}

#[tokio::test]
async fn ingest_csv_reads_loose_columns() {
    let app = setup_test_app().await;

    let csv = "Base URL,Type\nhttps://a.io/sports,sport\nhttps://b.io/sports,sports\n";
    let response = app
        .router
        .oneshot(
            Request::post("/v1/ingest/csv")
                .header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
                .header("content-type", "text/csv")
                .body(Body::from(csv))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["sports"], 2);
    assert_eq!(json["dropped"], 0);
}

#[tokio::test]
async fn details_are_paginated() {
    let app = setup_test_app().await;
    let sink = ResultSink::new(app.redis.store());
    for i in 0..5 {
        sink.append(
            Category::Event,
            &serde_json::json!({"title": format!("show {i}"), "event_link": format!("https://x.io/{i}")}),
        )
        .await
        .unwrap();
    }

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/v1/details/events?offset=1&limit=2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["category"], "event");
    assert_eq!(json["total"], 5);
    assert_eq!(json["records"].as_array().unwrap().len(), 2);
    assert_eq!(json["records"][0]["title"], "show 1");

    let response = app
        .router
        .oneshot(authed_get("/v1/details/event?limit=5000"))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["limit"], 100);
}

#[tokio::test]
async fn unknown_category_returns_400() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(authed_get("/v1/details/concerts"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_category");
}

#[tokio::test]
async fn stats_cover_every_category() {
    let app = setup_test_app().await;

    let response = app.router.oneshot(authed_get("/v1/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["jobs"]["scheduled"], 0);
    let categories: Vec<_> = json["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["category"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(categories, ["event", "festival", "sport"]);
}

#[tokio::test]
async fn exhausted_rate_limit_returns_429_with_retry_after() {
    let app = setup_test_app_with_rate_limit(2).await;

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(authed_get("/v1/stats"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/v1/stats"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let json = json_body(response).await;
    assert_eq!(json["error"], "rate_limit_exceeded");
    assert_eq!(json["requests_per_minute"], 2);
    assert_eq!(json["retry_after_seconds"], retry_after);

    // Health stays outside the limiter
    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_requests_do_not_consume_tokens() {
    let app = setup_test_app_with_rate_limit(1).await;

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/v1/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.router.oneshot(authed_get("/v1/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
