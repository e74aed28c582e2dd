use std::sync::Arc;
use std::time::Duration;

use medform_core::{FieldValue, Fragment, FragmentKey, Path, PathRecord};
use medform_forms::forms::lab_observation;
use medform_forms::{FieldId, IssueKind};
use medform_session::{CommitOutcome, Diagnostic, FormSession, LoadOutcome, SessionEnv, SessionError};
use medform_storage::InMemoryGateway;
use medform_vocab::{Catalogs, VocabularyRegistry};
use serde_json::Value;

fn env_with(gateway: &InMemoryGateway) -> SessionEnv {
    let catalogs = Catalogs::load(
        &VocabularyRegistry::builtin(),
        ["observation-interpretation", "device-kind", "device-status", "body-site"],
    )
    .unwrap();
    SessionEnv::new(Arc::new(catalogs), Arc::new(gateway.clone()))
}

fn observation_key() -> FragmentKey {
    FragmentKey::generate(Path::lit("Observation"))
}

fn open(env: &SessionEnv, key: &FragmentKey) -> FormSession {
    let form = Arc::new(lab_observation::definition().unwrap());
    FormSession::open(env, form, key.clone(), Some("Patient/1".into())).unwrap()
}

async fn stored_observation(gateway: &InMemoryGateway, key: &FragmentKey) {
    let body: Value = serde_json::from_str(
        r#"{
            "resourceType": "Observation",
            "status": "final",
            "valueQuantity": {"value": 4.20, "unit": "mmol/L"},
            "effectiveDateTime": "2024-02-02",
            "note": [{"text": "stored"}]
        }"#,
    )
    .unwrap();
    gateway.insert(Fragment::with_body(key.clone(), body)).await;
}

fn note_text(fragment: &Fragment) -> Option<&str> {
    fragment.get(&Path::lit("note[0].text")).and_then(Value::as_str)
}

#[tokio::test]
async fn edit_commit_reload_round_trip() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();

    let session = open(&env, &key);
    session.load().await.unwrap();
    session.set_field_text("value", "7.25 mmol/L").unwrap();
    session.set_field_text("effective_on", "2024-03-01").unwrap();
    session.set_field_text("interpretation", "H").unwrap();
    session.set_field_text("note", "recheck").unwrap();

    let outcome = session.commit().await.unwrap();
    assert_eq!(outcome, CommitOutcome::Saved { cleared: false });

    let stored = gateway.get(&key).await.unwrap();
    assert_eq!(
        stored.get(&Path::lit("subject.reference")),
        Some(&Value::String("Patient/1".into()))
    );
    assert_eq!(
        stored.get(&Path::lit("valueQuantity.value")).unwrap().to_string(),
        "7.25"
    );

    let reopened = open(&env, &key);
    reopened.load().await.unwrap();
    assert_eq!(
        reopened.value("interpretation").unwrap(),
        FieldValue::code("H")
    );
    let snapshot = reopened.snapshot().unwrap();
    let interpretation = snapshot
        .fields
        .iter()
        .find(|f| f.id == FieldId::from("interpretation"))
        .unwrap();
    assert_eq!(interpretation.display.as_deref(), Some("High"));
}

#[tokio::test]
async fn clearing_everything_deletes_the_fragment() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();
    stored_observation(&gateway, &key).await;

    let session = open(&env, &key);
    session.load().await.unwrap();
    session.set_field("value", FieldValue::Empty).unwrap();
    session.set_field("note", FieldValue::Empty).unwrap();

    let outcome = session.commit().await.unwrap();

    assert_eq!(outcome, CommitOutcome::Saved { cleared: true });
    assert!(gateway.get(&key).await.is_none());
}

#[tokio::test]
async fn invalid_fragment_is_not_saved() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let mut diagnostics = env.diagnostics.subscribe();
    let key = observation_key();

    let session = open(&env, &key);
    session.set_field_text("value", "7.25 mmol/L").unwrap();

    let outcome = session.commit().await.unwrap();

    let CommitOutcome::Blocked { issues } = outcome else {
        panic!("expected blocked commit, got {outcome:?}");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, FieldId::from("effective_on"));
    assert_eq!(issues[0].kind, IssueKind::Required);
    assert!(gateway.save_log().is_empty());
    assert!(matches!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::CommitBlocked { .. }
    ));
}

#[tokio::test]
async fn edits_made_during_fetch_win() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();
    stored_observation(&gateway, &key).await;
    gateway.set_fetch_latency(Duration::from_millis(60));

    let session = open(&env, &key);
    let loading = tokio::spawn({
        let session = session.clone();
        async move { session.load().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.set_field_text("note", "typed while loading").unwrap();

    let outcome = loading.await.unwrap().unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            discarded: vec![FieldId::from("note")],
            drift: 0,
        }
    );
    assert_eq!(
        session.value("note").unwrap(),
        FieldValue::text("typed while loading")
    );
    assert_eq!(
        session.value("effective_on").unwrap(),
        FieldValue::Date(jiff::civil::date(2024, 2, 2))
    );
}

#[tokio::test]
async fn fetch_after_close_is_a_no_op() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();
    stored_observation(&gateway, &key).await;
    gateway.set_fetch_latency(Duration::from_millis(40));

    let session = open(&env, &key);
    let loading = tokio::spawn({
        let session = session.clone();
        async move { session.load().await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    session.close();

    assert_eq!(loading.await.unwrap().unwrap(), LoadOutcome::Abandoned);
    assert_eq!(session.value("note").unwrap(), FieldValue::Empty);
    assert!(matches!(
        session.set_field_text("note", "late"),
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn saves_for_one_key_apply_in_submission_order() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();
    stored_observation(&gateway, &key).await;

    let session = open(&env, &key);
    session.load().await.unwrap();

    session.set_field_text("note", "first").unwrap();
    gateway.set_save_latency(Duration::from_millis(80));
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.commit().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    gateway.set_save_latency(Duration::ZERO);
    session.set_field_text("note", "second").unwrap();
    let second = session.commit().await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first, CommitOutcome::Saved { cleared: false });
    assert_eq!(second, CommitOutcome::Saved { cleared: false });
    let stored = gateway.get(&key).await.unwrap();
    assert_eq!(note_text(&stored), Some("second"));
}

#[tokio::test]
async fn failed_save_keeps_values_and_reports() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let mut diagnostics = env.diagnostics.subscribe();
    let key = observation_key();
    gateway.fail_saves_for(key.clone());

    let session = open(&env, &key);
    session.set_field_text("note", "unsaved").unwrap();

    let outcome = session.commit().await.unwrap();

    assert!(matches!(outcome, CommitOutcome::Failed { .. }));
    assert_eq!(session.value("note").unwrap(), FieldValue::text("unsaved"));
    assert!(matches!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::PersistenceFailure { .. }
    ));
}

#[tokio::test]
async fn repeatable_forms_need_a_group_session() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let form = Arc::new(medform_forms::forms::implanted_device::definition().unwrap());

    let err = FormSession::open(&env, form, observation_key(), None)
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::Repeatable(_)));
}

#[tokio::test]
async fn reload_of_deleted_fragment_empties_the_form() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();
    stored_observation(&gateway, &key).await;

    let session = open(&env, &key);
    session.load().await.unwrap();
    assert_eq!(session.value("note").unwrap(), FieldValue::text("stored"));

    gateway.insert(Fragment::empty(key.clone())).await;
    session.load().await.unwrap();

    assert_eq!(session.value("note").unwrap(), FieldValue::Empty);
    assert_eq!(session.value("value").unwrap(), FieldValue::Empty);
    assert!(session.issues().unwrap().is_empty());

    let outcome = session.commit().await.unwrap();
    assert_eq!(outcome, CommitOutcome::Saved { cleared: true });
    assert!(gateway.get(&key).await.is_none());
}

#[tokio::test]
async fn save_finishing_after_close_is_abandoned() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();
    stored_observation(&gateway, &key).await;

    let session = open(&env, &key);
    session.load().await.unwrap();
    session.set_field_text("note", "closing").unwrap();
    gateway.set_save_latency(Duration::from_millis(60));

    let saving = tokio::spawn({
        let session = session.clone();
        async move { session.commit().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.close();

    assert_eq!(saving.await.unwrap().unwrap(), CommitOutcome::Abandoned);
}

#[tokio::test]
async fn dropping_a_requirement_clears_its_error() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();

    let session = open(&env, &key);
    session.load().await.unwrap();
    session.set_field_text("value", "9.9 mmol/L").unwrap();
    session.set_field_text("effective_on", "2024-03-01").unwrap();
    session.set_field_text("interpretation", "HH").unwrap();

    let CommitOutcome::Blocked { issues } = session.commit().await.unwrap() else {
        panic!("abnormal result without a note must not save");
    };
    assert_eq!(issues[0].field, FieldId::from("note"));

    session.set_field_text("interpretation", "N").unwrap();
    assert!(session.issues().unwrap().is_empty());
    assert_eq!(
        session.commit().await.unwrap(),
        CommitOutcome::Saved { cleared: false }
    );
}

#[tokio::test]
async fn coded_text_takes_labels_and_rejects_typos() {
    let gateway = InMemoryGateway::new();
    let env = env_with(&gateway);
    let key = observation_key();

    let session = open(&env, &key);
    session.set_field_text("value", "9.9 mmol/L").unwrap();
    session.set_field_text("interpretation", "Critical high").unwrap();
    assert_eq!(
        session.value("interpretation").unwrap(),
        FieldValue::code("HH")
    );

    let err = session.set_field_text("interpretation", "Hihg").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Form(medform_forms::FormError::InvalidInput { .. })
    ));
    assert_eq!(
        session.value("interpretation").unwrap(),
        FieldValue::code("HH")
    );
}
