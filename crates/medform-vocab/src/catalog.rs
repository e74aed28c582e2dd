use std::collections::HashMap;

use medform_core::Coding;

use crate::entry::{CodeEntry, CodeLabel};
use crate::error::VocabError;
use crate::registry::VocabularyRegistry;

/// Immutable code ⇄ label lookup for one vocabulary.
#[derive(Debug, Clone)]
pub struct CodeCatalog {
    id: String,
    system: String,
    version: Option<String>,
    entries: Vec<CodeEntry>,
    by_code: HashMap<String, usize>,
}

impl CodeCatalog {
    /// Build the catalog for `id`.
    ///
    /// An unknown or empty vocabulary is a configuration defect: the error is
    /// meant to abort initialization of whatever form asked for it.
    pub fn new(registry: &VocabularyRegistry, id: &str) -> Result<Self, VocabError> {
        let vocabulary = registry
            .get(id)
            .ok_or_else(|| VocabError::UnknownVocabulary(id.to_string()))?;

        if vocabulary.entries.is_empty() {
            return Err(VocabError::EmptyVocabulary(id.to_string()));
        }

        let by_code = vocabulary
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.code.clone(), i))
            .collect();

        Ok(Self {
            id: vocabulary.id.clone(),
            system: vocabulary.system.clone(),
            version: vocabulary.version.clone(),
            entries: vocabulary.entries.clone(),
            by_code,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Every code with its display label, in table order.
    pub fn list_entries(&self) -> Vec<CodeLabel> {
        self.entries
            .iter()
            .map(|e| CodeLabel {
                code: e.code.clone(),
                label: e.label().to_string(),
            })
            .collect()
    }

    /// The table row for `code`, if the table has one.
    pub fn resolve(&self, code: &str) -> Option<&CodeEntry> {
        self.by_code.get(code).map(|&i| &self.entries[i])
    }

    /// A fresh coding for `code` stamped with this vocabulary's system and
    /// version.
    pub fn coding_for(&self, code: &str) -> Option<Coding> {
        let entry = self.resolve(code)?;
        Some(Coding {
            system: Some(self.system.clone()),
            version: self.version.clone(),
            code: entry.code.clone(),
            display: entry.display.clone(),
        })
    }

    /// Reverse lookup for widgets that hand back the chosen label.
    pub fn code_for_label(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.label() == label)
            .map(|e| e.code.as_str())
    }
}

/// Catalogs constructed once at start-up and shared by reference with every
/// form that needs them.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    catalogs: HashMap<String, CodeCatalog>,
}

impl Catalogs {
    /// Construct a catalog for each id. Fails on the first bad id.
    pub fn load<'a>(
        registry: &VocabularyRegistry,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, VocabError> {
        let mut catalogs = HashMap::new();
        for id in ids {
            if catalogs.contains_key(id) {
                continue;
            }
            let catalog = CodeCatalog::new(registry, id)?;
            catalogs.insert(id.to_string(), catalog);
        }
        tracing::info!(count = catalogs.len(), "code catalogs loaded");
        Ok(Self { catalogs })
    }

    pub fn get(&self, id: &str) -> Option<&CodeCatalog> {
        self.catalogs.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&CodeCatalog, VocabError> {
        self.get(id)
            .ok_or_else(|| VocabError::UnknownVocabulary(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}
