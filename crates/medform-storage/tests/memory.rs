use std::time::Duration;

use medform_core::{Fragment, FragmentKey, Path};
use medform_storage::{InMemoryGateway, PersistenceGateway, StorageError};
use serde_json::json;

#[tokio::test]
async fn fetch_returns_one_fragment_per_key_in_order() {
    let gateway = InMemoryGateway::new();
    let stored = FragmentKey::generate(Path::lit("Device"));
    let absent = FragmentKey::generate(Path::lit("Device"));
    gateway
        .insert(Fragment::with_body(stored.clone(), json!({"x": true})))
        .await;

    let fetched = gateway
        .fetch_fragments(&[absent.clone(), stored.clone()])
        .await
        .unwrap();

    assert_eq!(fetched[0], Fragment::empty(absent));
    assert_eq!(fetched[1].key, stored);
    assert_eq!(fetched[1].body, json!({"x": true}));
}

#[tokio::test]
async fn injected_save_failure_leaves_store_untouched() {
    let gateway = InMemoryGateway::new();
    let key = FragmentKey::generate(Path::lit("Device"));
    gateway.fail_saves_for(key.clone());

    let err = gateway
        .save_fragments(vec![Fragment::with_body(key.clone(), json!({"x": 1}))])
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Unavailable(_)));
    assert!(gateway.get(&key).await.is_none());
    assert_eq!(gateway.save_log().len(), 1);

    gateway.clear_faults();
    gateway
        .save_fragments(vec![Fragment::with_body(key.clone(), json!({"x": 1}))])
        .await
        .unwrap();
    assert!(gateway.get(&key).await.is_some());
}

#[tokio::test]
async fn clones_share_the_store() {
    let gateway = InMemoryGateway::new();
    let other = gateway.clone();
    let key = FragmentKey::generate(Path::lit("Observation"));

    gateway
        .save_fragments(vec![Fragment::with_body(key.clone(), json!({"v": 2}))])
        .await
        .unwrap();
    assert_eq!(other.len().await, 1);

    other.save_fragments(vec![Fragment::empty(key)]).await.unwrap();
    assert!(gateway.is_empty().await);
}

#[tokio::test]
async fn fetch_latency_delays_completion() {
    let gateway = InMemoryGateway::new();
    gateway.set_fetch_latency(Duration::from_millis(30));
    let key = FragmentKey::generate(Path::lit("Device"));

    let started = std::time::Instant::now();
    gateway.fetch_fragments(&[key]).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(30));
}
