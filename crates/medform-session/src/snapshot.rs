use medform_core::{FieldValue, FragmentKey};
use medform_forms::{FieldBinder, FieldId, FieldState, FormContext, ValidationIssue};
use serde::Serialize;
use uuid::Uuid;

/// What a front end needs to draw one field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSnapshot {
    pub id: FieldId,
    pub label: String,
    pub kind: &'static str,
    pub value: FieldValue,
    /// Catalog label for coded values, the raw code when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub state: FieldState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<ValidationIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSnapshot {
    pub form: String,
    pub key: FragmentKey,
    pub fields: Vec<FieldSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub id: Uuid,
    pub ordinal: usize,
    pub fields: Vec<FieldSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub form: String,
    pub index: FragmentKey,
    pub entries: Vec<EntrySnapshot>,
}

pub(crate) fn fields(binder: &FieldBinder<'_>, ctx: &FormContext) -> Vec<FieldSnapshot> {
    binder
        .form()
        .fields()
        .iter()
        .map(|spec| {
            let value = ctx.value(&spec.id).clone();
            FieldSnapshot {
                id: spec.id.clone(),
                label: spec.label.clone(),
                kind: spec.kind.name(),
                display: binder.display_label(&spec.id, &value),
                value,
                state: ctx.state(&spec.id),
                issue: ctx.issue(&spec.id).cloned(),
            }
        })
        .collect()
}
