use jiff::civil::date;
use medform_core::{Decimal, FieldValue, Path, QuantityValue, RangeValue};
use medform_forms::forms::{implanted_device, lab_observation};
use medform_forms::{
    Condition, DependencyEdge, DependencyGraph, Effect, FieldId, FieldKind, FieldSpec,
    FormDefinition, FormError, IssueKind,
};

fn quantity(value: &str, unit: &str) -> FieldValue {
    FieldValue::Quantity(QuantityValue {
        value: Some(Decimal::parse(value).unwrap()),
        unit: Some(unit.to_string()),
    })
}

fn id(s: &str) -> FieldId {
    FieldId::from(s)
}

#[test]
fn toggling_trigger_flips_required_once_and_clears_stale_error() {
    let form = lab_observation::definition().unwrap();
    let mut ctx = form.new_context();

    let report = form
        .set_value(&mut ctx, "value", quantity("4.2", "mmol/L"))
        .unwrap();
    let flips: Vec<_> = report.required_flips().map(|c| c.field.clone()).collect();
    assert_eq!(flips, vec![id("effective_on")]);
    assert!(ctx.state(&id("effective_on")).required);
    assert_eq!(
        ctx.issue(&id("effective_on")).map(|i| i.kind),
        Some(IssueKind::Required)
    );

    let report = form
        .set_value(&mut ctx, "value", FieldValue::Empty)
        .unwrap();
    let flips: Vec<_> = report.required_flips().map(|c| c.field.clone()).collect();
    assert_eq!(flips, vec![id("effective_on")]);
    assert!(!ctx.state(&id("effective_on")).required);
    assert!(ctx.issue(&id("effective_on")).is_none());
}

#[test]
fn reset_cascades_before_downstream_recompute() {
    let form = lab_observation::definition().unwrap();
    let mut ctx = form.new_context();
    assert!(ctx.state(&id("interpretation")).disabled);

    form.set_value(&mut ctx, "value", quantity("9.9", "mmol/L"))
        .unwrap();
    assert!(!ctx.state(&id("interpretation")).disabled);

    let report = form
        .set_value(&mut ctx, "interpretation", FieldValue::code("HH"))
        .unwrap();
    assert!(report.required_flips().any(|c| c.field == id("note")));
    assert_eq!(
        ctx.issue(&id("note")).map(|i| i.kind),
        Some(IssueKind::Required)
    );

    let report = form
        .set_value(&mut ctx, "value", FieldValue::Empty)
        .unwrap();

    assert_eq!(report.reset, vec![id("interpretation")]);
    assert!(ctx.value(&id("interpretation")).is_empty());
    assert!(ctx.state(&id("interpretation")).disabled);
    assert!(!ctx.state(&id("note")).required);
    assert!(ctx.issue(&id("note")).is_none());
    assert_eq!(
        report.state_changes.iter().filter(|c| c.field == id("note")).count(),
        1
    );
}

#[test]
fn initialize_reflects_loaded_values() {
    let form = implanted_device::definition().unwrap();
    let mut ctx = form.new_context();
    assert!(!ctx.state(&id("removal_reason")).visible);

    ctx.set_value(&id("removed_on"), FieldValue::Date(date(2024, 6, 1)));
    form.graph().initialize(&mut ctx);

    let state = ctx.state(&id("removal_reason"));
    assert!(state.visible);
    assert!(state.required);
}

#[test]
fn constraints_check_both_directions() {
    let form = implanted_device::definition().unwrap();
    let mut ctx = form.new_context();

    form.set_value(&mut ctx, "implanted_on", FieldValue::Date(date(2024, 5, 1)))
        .unwrap();
    form.set_value(&mut ctx, "removed_on", FieldValue::Date(date(2024, 4, 1)))
        .unwrap();

    assert_eq!(
        ctx.issue(&id("removed_on")).map(|i| i.kind),
        Some(IssueKind::Constraint)
    );
    assert_eq!(
        ctx.issue(&id("implanted_on")).map(|i| i.kind),
        Some(IssueKind::Constraint)
    );

    form.set_value(&mut ctx, "removed_on", FieldValue::Date(date(2024, 7, 1)))
        .unwrap();
    assert!(ctx.issue(&id("removed_on")).is_none());
    assert!(ctx.issue(&id("implanted_on")).is_none());
}

#[test]
fn clearing_removal_date_resets_reason() {
    let form = implanted_device::definition().unwrap();
    let mut ctx = form.new_context();

    form.set_value(&mut ctx, "removed_on", FieldValue::Date(date(2024, 7, 1)))
        .unwrap();
    form.set_value(&mut ctx, "removal_reason", FieldValue::text("battery depleted"))
        .unwrap();
    assert!(ctx.issue(&id("removal_reason")).is_none());

    let report = form
        .set_value(&mut ctx, "removed_on", FieldValue::Empty)
        .unwrap();

    assert_eq!(report.reset, vec![id("removal_reason")]);
    assert!(!ctx.state(&id("removal_reason")).visible);
    assert!(ctx.value(&id("removal_reason")).is_empty());
}

#[test]
fn inverted_range_is_a_constraint_issue() {
    let form = lab_observation::definition().unwrap();
    let mut ctx = form.new_context();

    form.set_value(
        &mut ctx,
        "reference_range",
        FieldValue::Range(RangeValue {
            low: Some(Decimal::parse("10").unwrap()),
            high: Some(Decimal::parse("9.5").unwrap()),
        }),
    )
    .unwrap();

    assert_eq!(
        ctx.issue(&id("reference_range")).map(|i| i.kind),
        Some(IssueKind::Constraint)
    );
}

#[test]
fn kind_mismatch_is_rejected() {
    let form = lab_observation::definition().unwrap();
    let mut ctx = form.new_context();
    let err = form
        .set_value(&mut ctx, "note", FieldValue::Boolean(true))
        .unwrap_err();
    assert!(matches!(err, FormError::KindMismatch { kind: "text", .. }));
}

#[test]
fn cycles_are_rejected_at_build() {
    let err = DependencyGraph::new(vec![
        DependencyEdge::new("a", Condition::Filled, Effect::SetRequired, "b"),
        DependencyEdge::new("b", Condition::Filled, Effect::SetRequired, "c"),
        DependencyEdge::new("c", Condition::Filled, Effect::ResetValue, "a"),
    ])
    .unwrap_err();

    match err {
        FormError::DependencyCycle(fields) => assert_eq!(fields, vec!["a", "b", "c"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn edges_must_name_known_fields() {
    let err = FormDefinition::builder("broken", Path::lit("Basic"))
        .field(FieldSpec::new(
            "a",
            "A",
            FieldKind::Text {
                path: Path::lit("a"),
            },
        ))
        .edge(DependencyEdge::new(
            "a",
            Condition::Filled,
            Effect::SetRequired,
            "missing",
        ))
        .build()
        .unwrap_err();
    assert!(matches!(err, FormError::UnknownField(f) if f == "missing"));
}

fn text_form(edges: Vec<DependencyEdge>) -> FormDefinition {
    let mut builder = FormDefinition::builder("chain", Path::lit("Basic"));
    for name in ["a", "b", "c"] {
        builder = builder.field(FieldSpec::new(
            name,
            name,
            FieldKind::Text {
                path: Path::field(name),
            },
        ));
    }
    for edge in edges {
        builder = builder.edge(edge);
    }
    builder.build().unwrap()
}

#[test]
fn sibling_reset_settles_before_dependents_are_recomputed() {
    let form = text_form(vec![
        DependencyEdge::new(
            "a",
            Condition::Equals(FieldValue::text("x")),
            Effect::SetRequired,
            "c",
        ),
        DependencyEdge::new(
            "a",
            Condition::Equals(FieldValue::text("z")),
            Effect::ResetValue,
            "b",
        ),
        DependencyEdge::new("b", Condition::Empty, Effect::SetRequired, "c"),
    ]);
    let mut ctx = form.new_context();
    form.set_value(&mut ctx, "a", FieldValue::text("x")).unwrap();
    form.set_value(&mut ctx, "b", FieldValue::text("y")).unwrap();
    assert!(ctx.state(&id("c")).required);

    let report = form.set_value(&mut ctx, "a", FieldValue::text("z")).unwrap();

    assert_eq!(report.reset, vec![id("b")]);
    assert!(ctx.value(&id("b")).is_empty());
    assert!(ctx.state(&id("c")).required);
    assert_eq!(report.required_flips().count(), 0);
    assert!(report.state_changes.iter().all(|c| c.field != id("c")));
    assert!(!report.revalidated.contains(&id("c")));
    assert_eq!(
        ctx.issue(&id("c")).map(|i| i.kind),
        Some(IssueKind::Required)
    );
}

#[test]
fn reset_chains_follow_topological_order() {
    let form = text_form(vec![
        DependencyEdge::new("a", Condition::Empty, Effect::ResetValue, "b"),
        DependencyEdge::new("b", Condition::Empty, Effect::ResetValue, "c"),
        DependencyEdge::new("a", Condition::Filled, Effect::SetRequired, "c"),
    ]);
    let mut ctx = form.new_context();
    form.set_value(&mut ctx, "a", FieldValue::text("on")).unwrap();
    form.set_value(&mut ctx, "b", FieldValue::text("kept")).unwrap();
    form.set_value(&mut ctx, "c", FieldValue::text("kept")).unwrap();

    let report = form.set_value(&mut ctx, "a", FieldValue::Empty).unwrap();

    assert_eq!(report.reset, vec![id("b"), id("c")]);
    let flips: Vec<_> = report.required_flips().map(|c| c.field.clone()).collect();
    assert_eq!(flips, vec![id("c")]);
    assert_eq!(
        report.revalidated.iter().filter(|f| **f == id("c")).count(),
        1
    );
    assert!(ctx.issue(&id("c")).is_none());
}
