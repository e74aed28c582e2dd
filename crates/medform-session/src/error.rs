use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("session state lock poisoned")]
    Poisoned,

    #[error("form {0} edits a single fragment, not a group")]
    NotRepeatable(String),

    #[error("form {0} edits a group, not a single fragment")]
    Repeatable(String),

    #[error("form error: {0}")]
    Form(#[from] medform_forms::FormError),

    #[error("storage error: {0}")]
    Storage(#[from] medform_storage::StorageError),
}
