use medform_core::FragmentKey;
use medform_forms::{BlockedEntry, FieldId, ValidationIssue};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded {
        /// Fields whose fetched value lost to an edit made during the fetch.
        discarded: Vec<FieldId>,
        drift: usize,
    },
    /// The group was reshaped while the fetch was in flight; nothing applied.
    Superseded,
    /// The session closed before the fetch completed.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// `cleared` when the fragment held nothing meaningful and was deleted.
    Saved { cleared: bool },
    Blocked { issues: Vec<ValidationIssue> },
    /// The store rejected the save. In-memory values are untouched.
    Failed { error: String },
    Abandoned,
}

#[derive(Debug, Clone, Default)]
pub struct GroupCommitReport {
    pub saved: Vec<FragmentKey>,
    pub failed: Vec<(FragmentKey, String)>,
    pub blocked: Vec<BlockedEntry>,
}

impl GroupCommitReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum GroupCommitOutcome {
    Committed(GroupCommitReport),
    Abandoned,
}
