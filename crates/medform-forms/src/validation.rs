//! Field-local validation and one-directional cross-field constraints.

use std::cmp::Ordering;

use medform_core::FieldValue;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::context::FormContext;
use crate::field::{FieldId, FieldSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum IssueKind {
    /// Required and empty.
    Required,
    /// Composite with some parts missing.
    Incomplete,
    /// A constraint against another field (or within a composite) failed.
    Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationIssue {
    pub field: FieldId,
    pub kind: IssueKind,
    pub message: String,
}

/// How `field` must relate to the field it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Date not after the other date.
    NotAfter,
    /// Date not before the other date.
    NotBefore,
    /// Decimal not greater than the other decimal.
    NotGreaterThan,
    /// Decimal not less than the other decimal.
    NotLessThan,
}

/// A read-only check of `field` against `reads`.
///
/// Mutually constrained pairs (start/end, lower/upper) are two constraints,
/// one per direction. Constraints never drive dependency recomputation.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub field: FieldId,
    pub reads: FieldId,
    pub rule: Rule,
}

impl Constraint {
    pub fn new(field: &str, rule: Rule, reads: &str) -> Self {
        Self {
            field: FieldId::from(field),
            reads: FieldId::from(reads),
            rule,
        }
    }

    /// Error message when the constraint is violated. Passes when either
    /// side is empty or the values are not comparable.
    pub fn check(&self, ctx: &FormContext) -> Option<String> {
        let own = ctx.value(&self.field);
        let other = ctx.value(&self.reads);

        let ordering = match (own, other) {
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => a.compare(b),
            _ => None,
        }?;

        let (violated, relation) = match self.rule {
            Rule::NotAfter => (ordering == Ordering::Greater, "after"),
            Rule::NotBefore => (ordering == Ordering::Less, "before"),
            Rule::NotGreaterThan => (ordering == Ordering::Greater, "greater than"),
            Rule::NotLessThan => (ordering == Ordering::Less, "less than"),
        };

        violated.then(|| format!("{} must not be {relation} {}", self.field, self.reads))
    }
}

/// Validate one field against its current state, value and constraints.
pub fn validate_field(
    spec: &FieldSpec,
    constraints: &[Constraint],
    ctx: &FormContext,
) -> Option<ValidationIssue> {
    let state = ctx.state(&spec.id);
    let value = ctx.value(&spec.id);

    if !state.visible || state.disabled {
        return None;
    }

    let issue = |kind, message: String| {
        Some(ValidationIssue {
            field: spec.id.clone(),
            kind,
            message,
        })
    };

    if value.is_empty() {
        if state.required {
            return issue(IssueKind::Required, format!("{} is required", spec.label));
        }
        return None;
    }

    if !value.is_complete() {
        return issue(
            IssueKind::Incomplete,
            format!("{} is incomplete: fill in every part or none", spec.label),
        );
    }

    if let FieldValue::Range(range) = value
        && let (Some(low), Some(high)) = (&range.low, &range.high)
        && low.compare(high) == Some(Ordering::Greater)
    {
        return issue(
            IssueKind::Constraint,
            format!("{}: lower bound exceeds upper bound", spec.label),
        );
    }

    constraints
        .iter()
        .filter(|c| c.field == spec.id)
        .find_map(|c| c.check(ctx))
        .and_then(|message| issue(IssueKind::Constraint, message))
}
