use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entry::CodeEntry;
use crate::error::VocabError;

/// A registered code table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    pub id: String,
    pub system: String,
    #[serde(default)]
    pub version: Option<String>,
    pub entries: Vec<CodeEntry>,
}

/// Vocabulary identifier → table.
///
/// Built once during start-up and only read afterwards. Empty tables may be
/// registered; they are rejected when a catalog is constructed from them.
#[derive(Debug, Clone, Default)]
pub struct VocabularyRegistry {
    tables: HashMap<String, Vocabulary>,
}

impl VocabularyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in table.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for table in crate::all_tables() {
            // Built-in tables are static and unique; a failure here is a
            // table definition bug caught by the test suite.
            if let Err(e) = registry.register(table.to_vocabulary()) {
                tracing::error!(error = %e, "built-in vocabulary rejected");
            }
        }
        registry
    }

    /// Add a table. Rejects a second table under the same id and tables that
    /// repeat a code.
    pub fn register(&mut self, vocabulary: Vocabulary) -> Result<(), VocabError> {
        if self.tables.contains_key(&vocabulary.id) {
            return Err(VocabError::AlreadyRegistered(vocabulary.id));
        }

        let mut seen = HashSet::new();
        for entry in &vocabulary.entries {
            if !seen.insert(entry.code.as_str()) {
                return Err(VocabError::DuplicateCode {
                    vocabulary: vocabulary.id.clone(),
                    code: entry.code.clone(),
                });
            }
        }

        tracing::debug!(
            vocabulary = %vocabulary.id,
            entries = vocabulary.entries.len(),
            "vocabulary registered"
        );
        self.tables.insert(vocabulary.id.clone(), vocabulary);
        Ok(())
    }

    /// Register every table in a JSON document holding an array of
    /// vocabularies. Returns how many were added.
    pub fn load_json_str(&mut self, json: &str) -> Result<usize, VocabError> {
        let vocabularies: Vec<Vocabulary> = serde_json::from_str(json)?;
        let count = vocabularies.len();
        for vocabulary in vocabularies {
            self.register(vocabulary)?;
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<&Vocabulary> {
        self.tables.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
