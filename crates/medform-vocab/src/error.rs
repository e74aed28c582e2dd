use thiserror::Error;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("no vocabulary registered for '{0}'")]
    UnknownVocabulary(String),

    #[error("vocabulary '{0}' has no entries")]
    EmptyVocabulary(String),

    #[error("vocabulary '{vocabulary}' lists code '{code}' more than once")]
    DuplicateCode { vocabulary: String, code: String },

    #[error("vocabulary '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
