//! medform-forms
//!
//! Form definitions and everything that runs against a [`FormContext`]:
//! binding field values to fragment paths, repeatable entry groups,
//! dependency propagation and validation. No I/O.

pub mod binder;
pub mod context;
pub mod dependency;
pub mod error;
pub mod field;
pub mod form;
pub mod forms;
pub mod repeatable;
pub mod validation;

pub use binder::{CodingMemory, Extracted, FieldBinder, Populated, VocabularyDrift};
pub use context::{FieldState, FormContext};
pub use dependency::{
    ChangeReport, Condition, DependencyEdge, DependencyGraph, Effect, StateChange,
};
pub use error::FormError;
pub use field::{Derived, FieldId, FieldKind, FieldSpec};
pub use form::{FormBuilder, FormDefinition};
pub use forms::{all_forms, get_form};
pub use repeatable::{BlockedEntry, EntryDrift, GroupCommit, RepeatableEntry, RepeatableGroup};
pub use validation::{Constraint, IssueKind, Rule, ValidationIssue};
