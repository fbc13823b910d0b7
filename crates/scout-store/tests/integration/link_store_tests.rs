use scout_core::category::Category;
use scout_core::link_store::{LinkState, LinkStore, Novelty};
use scout_core::sink::ResultSink;
use scout_core::store::KeyValueStore;

use crate::common::setup_test_redis;

#[tokio::test]
async fn link_lifecycle_uses_category_keys() {
    let (redis, _container) = setup_test_redis().await;
    let store = redis.store();
    let links = LinkStore::new(store.clone());
    let url = "https://example.com/events/1";

    assert_eq!(links.novelty(Category::Event, url).await.unwrap(), Novelty::New);
    links.mark_queued(Category::Event, url).await.unwrap();
    assert!(store.sismember("event_links_queue", url).await.unwrap());

    links.mark_processed(Category::Event, url).await.unwrap();
    assert!(store.sismember("processed_event_links", url).await.unwrap());
    assert!(!store.sismember("event_links_queue", url).await.unwrap());

    assert_eq!(
        links.novelty(Category::Event, url).await.unwrap(),
        Novelty::Duplicate
    );
}

#[tokio::test]
async fn terminal_failures_land_in_failed_sets() {
    let (redis, _container) = setup_test_redis().await;
    let store = redis.store();
    let links = LinkStore::new(store.clone());

    let detail = "https://example.com/sports/final";
    links.mark_queued(Category::Sport, detail).await.unwrap();
    links.mark_failed_detail(Category::Sport, detail).await.unwrap();
    assert!(store.sismember("failed_sport_detail_links", detail).await.unwrap());
    assert!(store.sismember("processed_sport_links", detail).await.unwrap());
    assert_eq!(
        links.state(Category::Sport, detail).await.unwrap(),
        LinkState::FailedTerminal
    );

    let main = "https://example.com/sports";
    links.mark_failed_main(Category::Sport, main).await.unwrap();
    assert!(store.sismember("failed_sport_links", main).await.unwrap());

    let stats = links.stats(Category::Sport).await.unwrap();
    assert_eq!(stats.failed_detail, 1);
    assert_eq!(stats.failed_main, 1);
    assert_eq!(stats.queued, 0);

    assert!(links.reset(Category::Sport, detail).await.unwrap());
    assert_eq!(
        links.state(Category::Sport, detail).await.unwrap(),
        LinkState::Unseen
    );
}

#[tokio::test]
async fn result_sink_appends_to_plural_list() {
    let (redis, _container) = setup_test_redis().await;
    let store = redis.store();
    let sink = ResultSink::new(store.clone());

    for title in ["a", "b", "c"] {
        sink.append(
            Category::Festival,
            &serde_json::json!({"title": title, "event_link": format!("https://x.io/{title}")}),
        )
        .await
        .unwrap();
    }

    assert_eq!(store.llen("festivals_details").await.unwrap(), 3);
    let page = sink.range(Category::Festival, 1, 10).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["title"], "b");
}

#[tokio::test]
async fn monthly_trigger_fires_once_per_month() {
    use std::io::Write;

    use chrono::{TimeZone, Utc};
    use scout_core::cron::MonthlyTrigger;
    use scout_core::job_queue::JobQueue;

    let (redis, _container) = setup_test_redis().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "url,type\nhttps://a.io/events,event\nhttps://b.io/sports,sport").unwrap();

    let first = MonthlyTrigger::new(redis.store(), redis.job_queue(4), file.path());
    let second = MonthlyTrigger::new(redis.store(), redis.job_queue(4), file.path());
    let at = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();

    let summary = first.fire(at).await.unwrap().expect("first claim wins");
    assert_eq!(summary.events, 1);
    assert_eq!(summary.sports, 1);
    assert!(second.fire(at).await.unwrap().is_none());

    let stats = redis.job_queue(4).stats().await.unwrap();
    assert_eq!(stats.scheduled, 2);
}
