use std::sync::Arc;

use medform_core::{FieldValue, Fragment, FragmentKey, Path, PathRecord};
use medform_forms::forms::implanted_device;
use medform_forms::repeatable::{index_entries, index_fragment};
use medform_forms::{FieldBinder, FieldId, FormDefinition, FormError, IssueKind, RepeatableGroup};
use medform_vocab::{Catalogs, VocabularyRegistry};
use uuid::Uuid;

fn setup() -> (Arc<FormDefinition>, Catalogs) {
    let form = Arc::new(implanted_device::definition().unwrap());
    let catalogs = Catalogs::load(&VocabularyRegistry::builtin(), form.vocabularies()).unwrap();
    (form, catalogs)
}

fn pacemaker() -> FieldValue {
    FieldValue::code("14106009")
}

fn stored_device(udi: &str) -> Fragment {
    let body = serde_json::json!({
        "resourceType": "Device",
        "type": {"coding": [{"system": "http://snomed.info/sct", "code": "14106009"}]},
        "udiCarrier": [{"deviceIdentifier": udi}],
    });
    Fragment::with_body(FragmentKey::generate(Path::lit("Device")), body)
}

#[test]
fn removing_a_sibling_keeps_identity_and_values() {
    let (form, _) = setup();
    let mut group = RepeatableGroup::new(form, Some("Patient/1".into()));

    let a = group.add();
    let b = group.add();
    group.set_value(b, "device_kind", pacemaker()).unwrap();
    group
        .set_value(b, "udi", FieldValue::text("(01)0884"))
        .unwrap();

    group.remove(a).unwrap();

    assert_eq!(group.len(), 1);
    let entry = group.entry(b).unwrap();
    assert_eq!(entry.id, b);
    assert_eq!(entry.ordinal, 0);
    assert_eq!(entry.context.value(&FieldId::from("device_kind")), &pacemaker());
    assert_eq!(entry.context.entry_id(), Some(b));
}

#[test]
fn ids_are_never_reused() {
    let (form, _) = setup();
    let mut group = RepeatableGroup::new(form, None);

    let a = group.add();
    group.remove(a).unwrap();
    let b = group.add();

    assert_ne!(a, b);
    assert!(matches!(group.remove(a), Err(FormError::UnknownEntry(id)) if id == a));
}

#[test]
fn reorder_moves_entry_and_renumbers() {
    let (form, _) = setup();
    let mut group = RepeatableGroup::new(form, None);
    let a = group.add();
    let b = group.add();
    let c = group.add();

    group.reorder(c, 0).unwrap();
    assert_eq!(group.ids(), vec![c, a, b]);

    group.reorder(c, 99).unwrap();
    assert_eq!(group.ids(), vec![a, b, c]);

    let ordinals: Vec<usize> = group.entries().iter().map(|e| e.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
}

#[test]
fn commit_clears_removed_entries_once() {
    let (form, catalogs) = setup();
    let binder = FieldBinder::new(&form, &catalogs).unwrap();
    let first = stored_device("(01)1111");
    let second = stored_device("(01)2222");

    let mut group = RepeatableGroup::new(Arc::clone(&form), Some("Patient/1".into()));
    let drift = group.load(&binder, &[first.clone(), second.clone()]);
    assert!(drift.is_empty());
    assert_eq!(group.ids(), vec![first.key.instance, second.key.instance]);

    group.remove(first.key.instance).unwrap();
    let commit = group.commit(&binder);

    assert_eq!(commit.deletes.len(), 1);
    assert_eq!(commit.deletes[0].key, first.key);
    assert!(commit.deletes[0].is_empty());

    assert_eq!(commit.writes.len(), 1);
    let written = &commit.writes[0];
    assert_eq!(written.key, second.key);
    assert_eq!(
        written.get(&Path::lit("identifier[0].value")),
        Some(&serde_json::Value::String(second.key.instance.to_string()))
    );
    assert_eq!(
        written.get(&Path::lit("patient.reference")),
        Some(&serde_json::Value::String("Patient/1".into()))
    );

    group.settle(commit.fragments());
    assert!(!group.is_persisted(first.key.instance));
    assert!(group.commit(&binder).deletes.is_empty());
}

#[test]
fn invalid_entries_are_withheld_untouched_entries_are_not() {
    let (form, catalogs) = setup();
    let binder = FieldBinder::new(&form, &catalogs).unwrap();
    let mut group = RepeatableGroup::new(Arc::clone(&form), None);

    let untouched = group.add();
    let partial = group.add();
    group
        .set_value(partial, "udi", FieldValue::text("(01)3333"))
        .unwrap();

    let commit = group.commit(&binder);

    assert_eq!(commit.blocked.len(), 1);
    assert_eq!(commit.blocked[0].id, partial);
    assert_eq!(commit.blocked[0].issues[0].kind, IssueKind::Required);
    assert_eq!(commit.writes.len(), 1);
    assert_eq!(commit.writes[0].key.instance, untouched);
    assert!(commit.writes[0].is_empty());
}

#[test]
fn index_lists_entries_in_order() {
    let key = FragmentKey::generate(Path::lit("DeviceList"));
    let ids = vec![Uuid::new_v4(), Uuid::new_v4()];

    let index = index_fragment(key.clone(), &ids);
    assert_eq!(index_entries(&index), ids);

    assert!(index_fragment(key, &[]).is_empty());
}
