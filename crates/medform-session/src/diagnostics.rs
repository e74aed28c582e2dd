//! Passive channel for things the user should hear about but that never
//! block editing.

use medform_core::FragmentKey;
use medform_forms::{FieldId, ValidationIssue, VocabularyDrift};
use serde::Serialize;
use tokio::sync::broadcast;

const CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A stored code the loaded vocabulary does not know.
    VocabularyDrift {
        key: FragmentKey,
        drift: VocabularyDrift,
    },
    /// Fetched values dropped because the user edited those fields while the
    /// fetch was in flight.
    FetchDiscarded {
        key: FragmentKey,
        fields: Vec<FieldId>,
    },
    /// A fragment was not saved because it failed validation.
    CommitBlocked {
        key: FragmentKey,
        issues: Vec<ValidationIssue>,
    },
    /// The store rejected a fetch or save. In-memory values are kept.
    PersistenceFailure {
        keys: Vec<FragmentKey>,
        error: String,
    },
}

/// Cloneable sender side. Emitting with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    tx: broadcast::Sender<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    pub fn emit(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::VocabularyDrift { key, drift } => tracing::warn!(
                %key,
                field = %drift.field,
                vocabulary = %drift.vocabulary,
                code = %drift.code,
                preserved = drift.preserved,
                "vocabulary drift"
            ),
            Diagnostic::FetchDiscarded { key, fields } => tracing::info!(
                %key,
                fields = fields.len(),
                "fetched values discarded for fields edited during fetch"
            ),
            Diagnostic::CommitBlocked { key, issues } => tracing::info!(
                %key,
                issues = issues.len(),
                "commit blocked by validation"
            ),
            Diagnostic::PersistenceFailure { keys, error } => tracing::warn!(
                keys = keys.len(),
                %error,
                "persistence failure"
            ),
        }
        // No receivers is not an error.
        let _ = self.tx.send(diagnostic);
    }
}
