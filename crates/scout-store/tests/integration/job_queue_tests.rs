use std::time::Duration;

use scout_core::category::Category;
use scout_core::job::{JobKind, NewJob};
use scout_core::job_queue::JobQueue;

use crate::common::setup_test_redis;

#[tokio::test]
async fn enqueue_and_claim_round_trip() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);

    let job = queue
        .enqueue(NewJob::discovery(Category::Event, "https://example.com/events"))
        .await
        .unwrap();
    assert_eq!(job.attempt, 0);
    assert_eq!(job.max_attempts, 4);

    let claimed = queue
        .claim("worker-1")
        .await
        .unwrap()
        .expect("Should claim the job");
    assert_eq!(claimed, job);
    assert_eq!(claimed.kind, JobKind::Discovery);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.scheduled, 0);
    assert_eq!(stats.running, 1);
    assert_eq!(queue.running_for("worker-1").await.unwrap(), 1);
}

#[tokio::test]
async fn claim_returns_none_when_empty() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);
    assert!(queue.claim("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn job_is_claimed_by_one_worker_only() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);
    queue
        .enqueue(NewJob::detail(Category::Sport, "https://example.com/m/1"))
        .await
        .unwrap();

    let (a, b) = tokio::join!(queue.claim("worker-a"), queue.claim("worker-b"));
    let claimed = [a.unwrap(), b.unwrap()];
    assert_eq!(claimed.iter().filter(|c| c.is_some()).count(), 1);
}

#[tokio::test]
async fn complete_and_fail_update_counters() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);
    for i in 0..2 {
        queue
            .enqueue(NewJob::detail(Category::Event, format!("https://x.io/{i}")))
            .await
            .unwrap();
    }

    let first = queue.claim("w").await.unwrap().unwrap();
    queue.complete(&first).await.unwrap();
    let second = queue.claim("w").await.unwrap().unwrap();
    queue.fail(&second, "HTTP 404").await.unwrap();

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.running, 0);
    assert_eq!(queue.running_for("w").await.unwrap(), 0);
}

#[tokio::test]
async fn retry_delays_redelivery_and_carries_attempt() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);
    queue
        .enqueue(NewJob::detail(Category::Festival, "https://x.io/f"))
        .await
        .unwrap();

    let job = queue.claim("w").await.unwrap().unwrap();
    queue
        .retry(&job, Duration::from_millis(300), 1, 0, "timed out")
        .await
        .unwrap();

    assert!(queue.claim("w").await.unwrap().is_none(), "not due yet");
    assert_eq!(queue.stats().await.unwrap().scheduled, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let again = queue.claim("w").await.unwrap().expect("due after delay");
    assert_eq!(again.id, job.id);
    assert_eq!(again.attempt, 1);
    assert_eq!(again.last_error.as_deref(), Some("timed out"));
}

#[tokio::test]
async fn release_worker_jobs_makes_them_claimable() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);
    for i in 0..3 {
        queue
            .enqueue(NewJob::detail(Category::Event, format!("https://x.io/{i}")))
            .await
            .unwrap();
    }
    queue.claim("worker-1").await.unwrap().unwrap();
    queue.claim("worker-1").await.unwrap().unwrap();
    let other = queue.claim("worker-2").await.unwrap().unwrap();

    let released = queue.release_worker_jobs("worker-1").await.unwrap();
    assert_eq!(released, 2);
    assert_eq!(queue.running_for("worker-1").await.unwrap(), 0);
    assert_eq!(queue.running_for("worker-2").await.unwrap(), 1);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.scheduled, 2);
    assert_eq!(stats.running, 1);

    let reclaimed = queue.claim("worker-3").await.unwrap().unwrap();
    assert_ne!(reclaimed.id, other.id);
}

#[tokio::test]
async fn abandoned_claims_are_reclaimed_by_age() {
    let (redis, _container) = setup_test_redis().await;
    let queue = redis.job_queue(4);
    let job = queue
        .enqueue(NewJob::detail(Category::Sport, "https://x.io/matches/1"))
        .await
        .unwrap();
    queue.claim("dead-worker").await.unwrap().unwrap();

    assert_eq!(queue.reclaim_stale(Duration::from_secs(3600)).await.unwrap(), 0);
    assert_eq!(queue.running_for("dead-worker").await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.reclaim_stale(Duration::from_millis(5)).await.unwrap(), 1);
    assert_eq!(queue.running_for("dead-worker").await.unwrap(), 0);

    let redelivered = queue.claim("worker-2").await.unwrap().unwrap();
    assert_eq!(redelivered.id, job.id);
    queue.complete(&redelivered).await.unwrap();

    assert_eq!(queue.reclaim_stale(Duration::ZERO).await.unwrap(), 0);
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.running, 0);
    assert_eq!(stats.scheduled, 0);
    assert_eq!(stats.completed, 1);
}
