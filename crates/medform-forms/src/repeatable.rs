//! Lists of independently keyed entries backed by one fragment each.
//!
//! An entry's id is the instance id of its fragment key. It is generated once
//! on `add` and never reused, so reordering or removing siblings never moves
//! another entry's data.

use std::collections::BTreeSet;
use std::sync::Arc;

use medform_core::{FieldValue, Fragment, FragmentKey, Path, PathRecord};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::binder::{CodingMemory, FieldBinder, VocabularyDrift};
use crate::context::FormContext;
use crate::dependency::ChangeReport;
use crate::error::FormError;
use crate::form::FormDefinition;
use crate::validation::ValidationIssue;

#[derive(Debug, Clone)]
pub struct RepeatableEntry {
    pub id: Uuid,
    pub ordinal: usize,
    pub context: FormContext,
    pub codings: CodingMemory,
}

impl RepeatableEntry {
    pub fn key(&self, resource: &Path) -> FragmentKey {
        FragmentKey::new(self.id, resource.clone())
    }
}

/// An entry withheld from a commit because it failed validation.
#[derive(Debug, Clone)]
pub struct BlockedEntry {
    pub id: Uuid,
    pub issues: Vec<ValidationIssue>,
}

/// Vocabulary drift found in one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDrift {
    pub id: Uuid,
    pub drift: VocabularyDrift,
}

/// Fragments one group commit wants saved.
#[derive(Debug, Clone, Default)]
pub struct GroupCommit {
    /// Rebuilt fragments of surviving entries. May be empty fragments when an
    /// entry holds no meaningful data.
    pub writes: Vec<Fragment>,
    /// Explicitly cleared fragments of entries removed since load.
    pub deletes: Vec<Fragment>,
    pub blocked: Vec<BlockedEntry>,
    pub drift: Vec<EntryDrift>,
}

impl GroupCommit {
    /// Every fragment to hand to the gateway, writes first.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.writes.iter().chain(self.deletes.iter())
    }

    pub fn is_blocked(&self) -> bool {
        !self.blocked.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RepeatableGroup {
    form: Arc<FormDefinition>,
    subject: Option<String>,
    entries: Vec<RepeatableEntry>,
    /// Ids with a non-empty fragment in storage.
    persisted: BTreeSet<Uuid>,
}

impl RepeatableGroup {
    pub fn new(form: Arc<FormDefinition>, subject: Option<String>) -> Self {
        Self {
            form,
            subject,
            entries: Vec::new(),
            persisted: BTreeSet::new(),
        }
    }

    pub fn form(&self) -> &FormDefinition {
        &self.form
    }

    fn context_for(&self, id: Uuid) -> FormContext {
        self.form
            .new_context()
            .with_subject(self.subject.clone())
            .with_entry_id(id)
    }

    /// Replace the entries with `fragments`, in the order given. Empty
    /// fragments stand for entries that are not stored and are skipped.
    pub fn load(&mut self, binder: &FieldBinder<'_>, fragments: &[Fragment]) -> Vec<EntryDrift> {
        self.entries.clear();
        self.persisted.clear();
        let mut drift = Vec::new();

        for fragment in fragments {
            if fragment.is_empty() {
                continue;
            }
            let id = fragment.key.instance;
            let populated = binder.populate(fragment);
            let mut context = self.context_for(id);
            populated.apply_to(&mut context);
            self.form.graph().initialize(&mut context);

            self.entries.push(RepeatableEntry {
                id,
                ordinal: self.entries.len(),
                context,
                codings: populated.codings,
            });
            self.persisted.insert(id);
            drift.extend(populated.drift.into_iter().map(|drift| EntryDrift { id, drift }));
        }

        info!(form = self.form.name(), entries = self.entries.len(), "group loaded");
        drift
    }

    /// Append an empty entry under a fresh id.
    pub fn add(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        let context = self.context_for(id);
        self.entries.push(RepeatableEntry {
            id,
            ordinal: self.entries.len(),
            context,
            codings: CodingMemory::default(),
        });
        debug!(form = self.form.name(), %id, "entry added");
        id
    }

    /// Drop an entry. Its fragment is cleared on the next commit if it was
    /// stored.
    pub fn remove(&mut self, id: Uuid) -> Result<RepeatableEntry, FormError> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        self.renumber();
        debug!(form = self.form.name(), %id, "entry removed");
        Ok(entry)
    }

    /// Move an entry to `new_ordinal` (clamped to the last slot).
    pub fn reorder(&mut self, id: Uuid, new_ordinal: usize) -> Result<(), FormError> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        let target = new_ordinal.min(self.entries.len());
        self.entries.insert(target, entry);
        self.renumber();
        Ok(())
    }

    fn renumber(&mut self) {
        for (ordinal, entry) in self.entries.iter_mut().enumerate() {
            entry.ordinal = ordinal;
        }
    }

    fn position(&self, id: Uuid) -> Result<usize, FormError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(FormError::UnknownEntry(id))
    }

    pub fn entries(&self) -> &[RepeatableEntry] {
        &self.entries
    }

    pub fn entry(&self, id: Uuid) -> Option<&RepeatableEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_persisted(&self, id: Uuid) -> bool {
        self.persisted.contains(&id)
    }

    /// Edit one field of one entry.
    pub fn set_value(
        &mut self,
        id: Uuid,
        field: &str,
        value: FieldValue,
    ) -> Result<ChangeReport, FormError> {
        let index = self.position(id)?;
        let form = Arc::clone(&self.form);
        form.set_value(&mut self.entries[index].context, field, value)
    }

    /// Rebuild every surviving entry and clear every stored entry that was
    /// removed. Entries with validation issues are withheld.
    pub fn commit(&mut self, binder: &FieldBinder<'_>) -> GroupCommit {
        let mut commit = GroupCommit::default();
        let resource = self.form.resource().clone();

        for entry in &mut self.entries {
            // Untouched entries are never blocked; they extract to nothing.
            let issues = if binder.has_meaningful_data(&entry.context) {
                self.form.validate_all(&mut entry.context)
            } else {
                Vec::new()
            };
            if !issues.is_empty() {
                warn!(form = self.form.name(), id = %entry.id, issues = issues.len(), "entry withheld from commit");
                commit.blocked.push(BlockedEntry {
                    id: entry.id,
                    issues,
                });
                continue;
            }

            let mut fragment = Fragment::empty(entry.key(&resource));
            let extracted = binder.extract(&entry.context, &mut fragment, &entry.codings);
            let id = entry.id;
            commit
                .drift
                .extend(extracted.drift.into_iter().map(|drift| EntryDrift { id, drift }));
            commit.writes.push(fragment);
        }

        let live: BTreeSet<Uuid> = self.entries.iter().map(|e| e.id).collect();
        for id in self.persisted.difference(&live) {
            commit
                .deletes
                .push(Fragment::empty(FragmentKey::new(*id, resource.clone())));
        }

        debug!(
            form = self.form.name(),
            writes = commit.writes.len(),
            deletes = commit.deletes.len(),
            blocked = commit.blocked.len(),
            "group commit prepared"
        );
        commit
    }

    /// Record fragments the store has accepted, so removed entries are
    /// cleared once and only once.
    pub fn settle<'f>(&mut self, saved: impl IntoIterator<Item = &'f Fragment>) {
        for fragment in saved {
            let id = fragment.key.instance;
            if fragment.is_empty() {
                self.persisted.remove(&id);
            } else {
                self.persisted.insert(id);
            }
        }
    }
}

/// Fragment listing a group's entry ids in display order.
pub fn index_fragment(key: FragmentKey, ids: &[Uuid]) -> Fragment {
    if ids.is_empty() {
        return Fragment::empty(key);
    }
    let entries: Vec<Value> = ids.iter().map(|id| Value::String(id.to_string())).collect();
    Fragment::with_body(key, json!({ "entries": entries }))
}

/// Entry ids listed in an index fragment. Unparseable ids are skipped.
pub fn index_entries(fragment: &Fragment) -> Vec<Uuid> {
    let Some(Value::Array(items)) = fragment.get(&Path::lit("entries")) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|s| match Uuid::parse_str(s) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(key = %fragment.key, value = s, error = %e, "skipping bad entry id in index");
                None
            }
        })
        .collect()
}
