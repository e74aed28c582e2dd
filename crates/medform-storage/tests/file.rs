use medform_core::{Fragment, FragmentKey, Path};
use medform_storage::{JsonFileGateway, PersistenceGateway, StorageError};
use serde_json::json;

fn device_key() -> FragmentKey {
    FragmentKey::generate(Path::lit("Device"))
}

#[tokio::test]
async fn missing_fragments_come_back_empty() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = JsonFileGateway::new(dir.path().join("store"));
    let key = device_key();

    let fetched = gateway.fetch_fragments(&[key.clone()]).await.unwrap();

    assert_eq!(fetched, vec![Fragment::empty(key)]);
}

#[tokio::test]
async fn save_then_fetch_keeps_decimal_text() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = JsonFileGateway::new(dir.path());
    let key = device_key();
    let body: serde_json::Value = serde_json::from_str(r#"{"value": 5.10, "unit": "mg"}"#).unwrap();

    gateway
        .save_fragments(vec![Fragment::with_body(key.clone(), body.clone())])
        .await
        .unwrap();
    let fetched = gateway.fetch_fragments(&[key]).await.unwrap();

    assert_eq!(fetched[0].body, body);
    assert_eq!(fetched[0].body["value"].to_string(), "5.10");
}

#[tokio::test]
async fn saving_an_empty_fragment_deletes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = JsonFileGateway::new(dir.path());
    let key = device_key();

    gateway
        .save_fragments(vec![Fragment::with_body(key.clone(), json!({"a": 1}))])
        .await
        .unwrap();
    assert_eq!(gateway.list_keys(None).await.unwrap(), vec![key.clone()]);

    gateway
        .save_fragments(vec![Fragment::empty(key.clone())])
        .await
        .unwrap();
    assert!(gateway.list_keys(None).await.unwrap().is_empty());

    // Deleting again is not an error.
    gateway
        .save_fragments(vec![Fragment::empty(key)])
        .await
        .unwrap();
}

#[tokio::test]
async fn list_keys_filters_by_resource_and_skips_strays() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = JsonFileGateway::new(dir.path());
    let device = device_key();
    let observation = FragmentKey::generate(Path::lit("Observation"));

    gateway
        .save_fragments(vec![
            Fragment::with_body(device.clone(), json!({"a": 1})),
            Fragment::with_body(observation.clone(), json!({"b": 2})),
        ])
        .await
        .unwrap();
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();
    std::fs::write(dir.path().join("README"), "x").unwrap();

    let devices = gateway.list_keys(Some(&Path::lit("Device"))).await.unwrap();
    assert_eq!(devices, vec![device]);

    let all = gateway.list_keys(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains(&observation));
}

#[tokio::test]
async fn mismatched_file_is_reported_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = JsonFileGateway::new(dir.path());
    let key = device_key();
    let other = device_key();

    let stray = Fragment::with_body(other, json!({"a": 1}));
    std::fs::write(
        dir.path().join(format!("{key}.json")),
        serde_json::to_vec(&stray).unwrap(),
    )
    .unwrap();

    let err = gateway.fetch_fragments(&[key]).await.unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}
