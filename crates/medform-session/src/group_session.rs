//! A repeatable form: an ordered list of entries, one fragment each, plus an
//! index fragment that records the order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use medform_core::{FieldValue, Fragment, FragmentKey};
use medform_forms::repeatable::{index_entries, index_fragment};
use medform_forms::{ChangeReport, FieldId, FormDefinition, RepeatableGroup};
use tracing::{debug, info};
use uuid::Uuid;

use crate::diagnostics::Diagnostic;
use crate::env::SessionEnv;
use crate::error::SessionError;
use crate::outcome::{GroupCommitOutcome, GroupCommitReport, LoadOutcome};
use crate::snapshot::{self, EntrySnapshot, GroupSnapshot};

struct State {
    group: RepeatableGroup,
    generation: u64,
    edited_at: BTreeMap<(Uuid, FieldId), u64>,
    /// Generation of the last add, remove or reorder.
    reshaped_at: u64,
}

struct Inner {
    env: SessionEnv,
    form: Arc<FormDefinition>,
    index_key: FragmentKey,
    alive: AtomicBool,
    state: Mutex<State>,
}

#[derive(Clone)]
pub struct GroupSession {
    inner: Arc<Inner>,
}

impl GroupSession {
    pub fn open(
        env: &SessionEnv,
        form: Arc<FormDefinition>,
        index_key: FragmentKey,
        subject: Option<String>,
    ) -> Result<Self, SessionError> {
        if !form.is_repeatable() {
            return Err(SessionError::NotRepeatable(form.name().to_string()));
        }
        env.binder(&form)?;

        let group = RepeatableGroup::new(Arc::clone(&form), subject);
        info!(form = form.name(), index = %index_key, "group session opened");

        Ok(Self {
            inner: Arc::new(Inner {
                env: env.clone(),
                form,
                index_key,
                alive: AtomicBool::new(true),
                state: Mutex::new(State {
                    group,
                    generation: 0,
                    edited_at: BTreeMap::new(),
                    reshaped_at: 0,
                }),
            }),
        })
    }

    pub fn index_key(&self) -> &FragmentKey {
        &self.inner.index_key
    }

    pub fn form(&self) -> &FormDefinition {
        &self.inner.form
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        if self.inner.alive.swap(false, Ordering::SeqCst) {
            info!(index = %self.inner.index_key, "group session closed");
        }
    }

    fn ensure_alive(&self) -> Result<(), SessionError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, SessionError> {
        self.inner.state.lock().map_err(|_| SessionError::Poisoned)
    }

    fn emit(&self, diagnostic: Diagnostic) {
        self.inner.env.diagnostics.emit(diagnostic);
    }

    fn entry_key(&self, id: Uuid) -> FragmentKey {
        FragmentKey::new(id, self.inner.form.resource().clone())
    }

    async fn fetch(&self, keys: &[FragmentKey]) -> Result<Vec<Fragment>, SessionError> {
        match self.inner.env.gateway.fetch_fragments(keys).await {
            Ok(fragments) => Ok(fragments),
            Err(e) => {
                if self.is_alive() {
                    self.emit(Diagnostic::PersistenceFailure {
                        keys: keys.to_vec(),
                        error: e.to_string(),
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Fetch the index and every entry it lists, then replace the entries.
    ///
    /// If entries were added, removed or reordered while fetching, the fetch
    /// is dropped. Field edits made while fetching are kept.
    pub async fn load(&self) -> Result<LoadOutcome, SessionError> {
        self.ensure_alive()?;
        let started = self.state()?.generation;

        let index = self
            .fetch(std::slice::from_ref(&self.inner.index_key))
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| Fragment::empty(self.inner.index_key.clone()));
        let keys: Vec<FragmentKey> = index_entries(&index)
            .into_iter()
            .map(|id| self.entry_key(id))
            .collect();
        let fragments = self.fetch(&keys).await?;

        if !self.is_alive() {
            debug!(index = %self.inner.index_key, "fetch completed after close, ignored");
            return Ok(LoadOutcome::Abandoned);
        }

        let (kept, drift) = {
            let binder = self.inner.env.binder(&self.inner.form)?;
            let mut guard = self.state()?;
            let state = &mut *guard;

            if state.reshaped_at > started {
                info!(index = %self.inner.index_key, "group reshaped during fetch, fetch dropped");
                return Ok(LoadOutcome::Superseded);
            }

            let previous = state.group.clone();
            let drift = state.group.load(&binder, &fragments);

            let edited: Vec<(Uuid, FieldId)> = state
                .edited_at
                .iter()
                .filter(|&(_, &at)| at > started)
                .map(|(entry_field, _)| entry_field.clone())
                .collect();
            let mut kept = Vec::new();
            for (id, field) in edited {
                let (Some(before), Some(_)) = (previous.entry(id), state.group.entry(id)) else {
                    continue;
                };
                let value = before.context.value(&field).clone();
                state.group.set_value(id, field.as_str(), value)?;
                kept.push((id, field));
            }
            (kept, drift)
        };

        for found in &drift {
            self.emit(Diagnostic::VocabularyDrift {
                key: self.entry_key(found.id),
                drift: found.drift.clone(),
            });
        }
        let mut by_entry: BTreeMap<Uuid, Vec<FieldId>> = BTreeMap::new();
        for (id, field) in &kept {
            by_entry.entry(*id).or_default().push(field.clone());
        }
        for (id, fields) in by_entry {
            self.emit(Diagnostic::FetchDiscarded {
                key: self.entry_key(id),
                fields,
            });
        }

        info!(index = %self.inner.index_key, entries = keys.len(), "group loaded");
        Ok(LoadOutcome::Loaded {
            discarded: kept.into_iter().map(|(_, field)| field).collect(),
            drift: drift.len(),
        })
    }

    fn reshape<T>(
        &self,
        f: impl FnOnce(&mut RepeatableGroup) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        self.ensure_alive()?;
        let mut guard = self.state()?;
        let state = &mut *guard;
        let out = f(&mut state.group)?;
        state.generation += 1;
        state.reshaped_at = state.generation;
        Ok(out)
    }

    pub fn add(&self) -> Result<Uuid, SessionError> {
        self.reshape(|group| Ok(group.add()))
    }

    pub fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        self.reshape(|group| {
            group.remove(id)?;
            Ok(())
        })
    }

    pub fn reorder(&self, id: Uuid, new_ordinal: usize) -> Result<(), SessionError> {
        self.reshape(|group| Ok(group.reorder(id, new_ordinal)?))
    }

    pub fn set_field(
        &self,
        id: Uuid,
        field: &str,
        value: FieldValue,
    ) -> Result<ChangeReport, SessionError> {
        self.ensure_alive()?;
        let mut guard = self.state()?;
        let state = &mut *guard;

        let report = state.group.set_value(id, field, value)?;
        state.generation += 1;
        state
            .edited_at
            .insert((id, FieldId::from(field)), state.generation);
        Ok(report)
    }

    pub fn set_field_text(
        &self,
        id: Uuid,
        field: &str,
        text: &str,
    ) -> Result<ChangeReport, SessionError> {
        let value = {
            let binder = self.inner.env.binder(&self.inner.form)?;
            let state = self.state()?;
            let entry = state
                .group
                .entry(id)
                .ok_or(medform_forms::FormError::UnknownEntry(id))?;
            binder.parse_input(field, text, &entry.codings)?
        };
        self.set_field(id, field, value)
    }

    pub fn ids(&self) -> Result<Vec<Uuid>, SessionError> {
        Ok(self.state()?.group.ids())
    }

    pub fn value(&self, id: Uuid, field: &str) -> Result<FieldValue, SessionError> {
        let spec = self.inner.form.require_field(field)?;
        let state = self.state()?;
        let entry = state
            .group
            .entry(id)
            .ok_or(medform_forms::FormError::UnknownEntry(id))?;
        Ok(entry.context.value(&spec.id).clone())
    }

    pub fn snapshot(&self) -> Result<GroupSnapshot, SessionError> {
        let binder = self.inner.env.binder(&self.inner.form)?;
        let state = self.state()?;
        let entries = state
            .group
            .entries()
            .iter()
            .map(|entry| EntrySnapshot {
                id: entry.id,
                ordinal: entry.ordinal,
                fields: snapshot::fields(&binder, &entry.context),
            })
            .collect();
        Ok(GroupSnapshot {
            form: self.inner.form.name().to_string(),
            index: self.inner.index_key.clone(),
            entries,
        })
    }

    /// Rebuild every entry, clear removed ones, rewrite the index, and save
    /// each fragment on its own. One failed save does not stop the others.
    pub async fn commit(&self) -> Result<GroupCommitOutcome, SessionError> {
        self.ensure_alive()?;

        let (commit, index) = {
            let binder = self.inner.env.binder(&self.inner.form)?;
            let mut guard = self.state()?;
            let commit = guard.group.commit(&binder);
            let index = index_fragment(self.inner.index_key.clone(), &guard.group.ids());
            (commit, index)
        };

        for blocked in &commit.blocked {
            self.emit(Diagnostic::CommitBlocked {
                key: self.entry_key(blocked.id),
                issues: blocked.issues.clone(),
            });
        }
        for found in &commit.drift {
            self.emit(Diagnostic::VocabularyDrift {
                key: self.entry_key(found.id),
                drift: found.drift.clone(),
            });
        }

        let fragments: Vec<Fragment> = commit
            .fragments()
            .cloned()
            .chain(std::iter::once(index))
            .collect();
        let gateway = self.inner.env.gateway.as_ref();
        let queue = &self.inner.env.queue;
        let results = join_all(
            fragments
                .iter()
                .cloned()
                .map(|fragment| queue.save(gateway, fragment)),
        )
        .await;

        if !self.is_alive() {
            debug!(index = %self.inner.index_key, "saves completed after close, ignored");
            return Ok(GroupCommitOutcome::Abandoned);
        }

        let mut report = GroupCommitReport {
            blocked: commit.blocked,
            ..Default::default()
        };
        let mut settled = Vec::new();
        for (fragment, result) in fragments.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    report.saved.push(fragment.key.clone());
                    if fragment.key != self.inner.index_key {
                        settled.push(fragment);
                    }
                }
                Err(e) => report.failed.push((fragment.key, e.to_string())),
            }
        }

        self.state()?.group.settle(&settled);

        for (key, error) in &report.failed {
            self.emit(Diagnostic::PersistenceFailure {
                keys: vec![key.clone()],
                error: error.clone(),
            });
        }

        info!(
            index = %self.inner.index_key,
            saved = report.saved.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            "group committed"
        );
        Ok(GroupCommitOutcome::Committed(report))
    }
}
