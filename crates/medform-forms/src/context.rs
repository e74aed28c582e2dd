//! Explicit per-form state: values, derived field states, validation issues.
//!
//! Binder, dependency graph and validation all read and write through a
//! [`FormContext`] handed to them; nothing reaches for shared state.

use std::collections::BTreeMap;

use medform_core::FieldValue;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::field::FieldId;
use crate::form::FormDefinition;
use crate::validation::ValidationIssue;

static EMPTY: FieldValue = FieldValue::Empty;

/// Derived presentation state of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FieldState {
    pub required: bool,
    pub visible: bool,
    pub disabled: bool,
}

impl Default for FieldState {
    fn default() -> Self {
        Self {
            required: false,
            visible: true,
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormContext {
    values: BTreeMap<FieldId, FieldValue>,
    base: BTreeMap<FieldId, FieldState>,
    states: BTreeMap<FieldId, FieldState>,
    issues: BTreeMap<FieldId, ValidationIssue>,
    subject: Option<String>,
    entry_id: Option<Uuid>,
}

impl FormContext {
    /// Empty values and base states for every field of `form`.
    pub fn new(form: &FormDefinition) -> Self {
        let base: BTreeMap<_, _> = form
            .fields()
            .iter()
            .map(|f| {
                (
                    f.id.clone(),
                    FieldState {
                        required: f.required,
                        ..FieldState::default()
                    },
                )
            })
            .collect();

        Self {
            values: BTreeMap::new(),
            states: base.clone(),
            base,
            issues: BTreeMap::new(),
            subject: None,
            entry_id: None,
        }
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_entry_id(mut self, id: Uuid) -> Self {
        self.entry_id = Some(id);
        self
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn entry_id(&self) -> Option<Uuid> {
        self.entry_id
    }

    /// Current value; absent fields read as [`FieldValue::Empty`].
    pub fn value(&self, id: &FieldId) -> &FieldValue {
        self.values.get(id).unwrap_or(&EMPTY)
    }

    /// Store a value, returning the previous one.
    pub fn set_value(&mut self, id: &FieldId, value: FieldValue) -> FieldValue {
        if value == FieldValue::Empty {
            return self.values.remove(id).unwrap_or_default();
        }
        self.values.insert(id.clone(), value).unwrap_or_default()
    }

    pub fn reset(&mut self, id: &FieldId) -> FieldValue {
        self.set_value(id, FieldValue::Empty)
    }

    pub fn values(&self) -> impl Iterator<Item = (&FieldId, &FieldValue)> {
        self.values.iter()
    }

    pub fn state(&self, id: &FieldId) -> FieldState {
        self.states.get(id).copied().unwrap_or_default()
    }

    pub fn base_state(&self, id: &FieldId) -> FieldState {
        self.base.get(id).copied().unwrap_or_default()
    }

    pub(crate) fn set_state(&mut self, id: &FieldId, state: FieldState) {
        self.states.insert(id.clone(), state);
    }

    pub fn issue(&self, id: &FieldId) -> Option<&ValidationIssue> {
        self.issues.get(id)
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.values()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub(crate) fn set_issue(&mut self, id: &FieldId, issue: Option<ValidationIssue>) {
        match issue {
            Some(issue) => {
                self.issues.insert(id.clone(), issue);
            }
            None => {
                self.issues.remove(id);
            }
        }
    }
}
