use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field '{0}' is defined more than once")]
    DuplicateField(String),

    #[error("dependency cycle through fields: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("field '{field}' needs vocabulary '{vocabulary}', which is not loaded")]
    MissingCatalog { field: String, vocabulary: String },

    #[error("no repeatable entry with id {0}")]
    UnknownEntry(Uuid),

    #[error("cannot read input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("value for field '{field}' does not fit its kind ({kind})")]
    KindMismatch { field: String, kind: &'static str },

    #[error("vocabulary error: {0}")]
    Vocabulary(#[from] medform_vocab::VocabError),
}
