use medform_cli::config::{LogFormat, MedformConfig, load_config, load_or_default, migrate, save_config};

fn sample(dir: &std::path::Path) -> MedformConfig {
    MedformConfig {
        config_version: 1,
        store_dir: dir.join("store"),
        subject_reference: Some("Patient/123".to_string()),
        vocabulary_files: vec![dir.join("extra.json")],
        log_format: LogFormat::Json,
        created_at: "2026-03-01T09:30:00Z".parse().unwrap(),
    }
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let config = sample(dir.path());

    save_config(&path, &config).unwrap();
    let loaded = load_config(&path).unwrap();

    assert_eq!(loaded, config);
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn save_stamps_current_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut config = sample(dir.path());
    config.config_version = 0;

    save_config(&path, &config).unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["config_version"], 1);
}

#[test]
fn unversioned_config_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"store_dir": "/var/lib/medform", "created_at": "2025-11-02T08:00:00Z"}"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.config_version, 1);
    assert!(config.vocabulary_files.is_empty());
    assert_eq!(config.log_format, LogFormat::Pretty);
    assert_eq!(config.subject_reference, None);
}

#[test]
fn migration_keeps_existing_vocabulary_files() {
    let json = serde_json::json!({
        "store_dir": "/tmp/s",
        "vocabulary_files": ["/tmp/a.json"],
        "created_at": "2025-11-02T08:00:00Z",
    });
    let migrated = migrate(json, 0).unwrap();
    assert_eq!(migrated["vocabulary_files"][0], "/tmp/a.json");
    assert_eq!(migrated["config_version"], 1);
}

#[test]
fn newer_config_is_rejected() {
    let json = serde_json::json!({ "config_version": 7 });
    let err = migrate(json, 7).unwrap_err();
    assert!(err.to_string().contains("newer"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_or_default(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config.config_version, 1);
    assert!(config.vocabulary_files.is_empty());
}
