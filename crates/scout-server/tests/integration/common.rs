use std::sync::Arc;

use axum::Router;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

use scout_core::ApiRateLimiter;
use scout_server::routes;
use scout_server::state::AppState;
use scout_store::{Redis, RedisConfig};

pub const TEST_ADMIN_TOKEN: &str = "test-secret-token";

/// Router plus handles the tests need to seed and inspect Redis.
///
/// The container must be kept alive for the test duration.
pub struct TestApp {
    pub router: Router,
    pub redis: Redis,
    _container: ContainerAsync<GenericImage>,
}

/// App with the admin token set and a generous rate limit.
pub async fn setup_test_app() -> TestApp {
    setup(Some(TEST_ADMIN_TOKEN), 1000).await
}

/// App without an admin token: every `/v1` route is disabled.
pub async fn setup_test_app_no_auth() -> TestApp {
    setup(None, 1000).await
}

/// App with the admin token set and a tight inbound rate limit.
pub async fn setup_test_app_with_rate_limit(requests_per_minute: u32) -> TestApp {
    setup(Some(TEST_ADMIN_TOKEN), requests_per_minute).await
}

async fn setup(admin_token: Option<&str>, requests_per_minute: u32) -> TestApp {
    let container = GenericImage::new("redis", "7")
        .with_exposed_port(ContainerPort::Tcp(6379))
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get port");
    let config = RedisConfig {
        url: format!("redis://{host}:{port}/0"),
    };

    let redis = retry_connect(&config).await;
    let limiter = Arc::new(ApiRateLimiter::new(requests_per_minute).unwrap());
    let mut state = AppState::new(redis.clone(), 4, limiter);
    if let Some(token) = admin_token {
        state = state.with_admin_token(token);
    }

    TestApp {
        router: routes::router(Arc::new(state)),
        redis,
        _container: container,
    }
}

async fn retry_connect(config: &RedisConfig) -> Redis {
    for _ in 0..30 {
        if let Ok(redis) = Redis::connect(config).await
            && redis.ping().await.is_ok()
        {
            return redis;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test Redis");
}
