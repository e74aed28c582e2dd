use std::time::Duration;

use medform_core::{Fragment, FragmentKey, Path};
use medform_session::SaveQueue;
use medform_storage::InMemoryGateway;
use serde_json::json;

fn device_fragment(key: &FragmentKey, serial: &str) -> Fragment {
    Fragment::with_body(
        key.clone(),
        json!({"resourceType": "Device", "serialNumber": serial}),
    )
}

#[tokio::test]
async fn last_submitted_save_sticks() {
    let gateway = InMemoryGateway::new();
    gateway.set_save_latency(Duration::from_millis(20));
    let queue = SaveQueue::new();
    let key = FragmentKey::generate(Path::lit("Device"));

    let (first, second, third) = tokio::join!(
        queue.save(&gateway, device_fragment(&key, "A-1")),
        queue.save(&gateway, device_fragment(&key, "A-2")),
        queue.save(&gateway, device_fragment(&key, "A-3")),
    );
    first.unwrap();
    second.unwrap();
    third.unwrap();

    let stored = gateway.get(&key).await.unwrap();
    assert_eq!(stored.body["serialNumber"], "A-3");
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn finished_keys_are_forgotten() {
    let gateway = InMemoryGateway::new();
    let queue = SaveQueue::new();

    for n in 0..50 {
        let key = FragmentKey::generate(Path::lit("Device"));
        queue
            .save(&gateway, device_fragment(&key, &format!("S-{n}")))
            .await
            .unwrap();
    }

    assert_eq!(gateway.len().await, 50);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn failed_saves_release_their_slot() {
    let gateway = InMemoryGateway::new();
    let queue = SaveQueue::new();
    let key = FragmentKey::generate(Path::lit("Device"));
    gateway.fail_saves_for(key.clone());

    assert!(queue.save(&gateway, device_fragment(&key, "X")).await.is_err());
    assert_eq!(queue.pending(), 0);
}
