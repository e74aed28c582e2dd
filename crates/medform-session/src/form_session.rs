//! One form bound to one fragment.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use medform_core::{FieldValue, Fragment, FragmentKey, PathRecord};
use medform_forms::{
    ChangeReport, CodingMemory, FieldId, FormContext, FormDefinition, ValidationIssue,
};
use tracing::{debug, info};

use crate::diagnostics::Diagnostic;
use crate::env::SessionEnv;
use crate::error::SessionError;
use crate::outcome::{CommitOutcome, LoadOutcome};
use crate::snapshot::{self, FormSnapshot};

struct State {
    ctx: FormContext,
    codings: CodingMemory,
    /// Bumped on every user edit.
    generation: u64,
    /// Generation of each field's latest edit.
    edited_at: BTreeMap<FieldId, u64>,
}

struct Inner {
    env: SessionEnv,
    form: Arc<FormDefinition>,
    key: FragmentKey,
    alive: AtomicBool,
    state: Mutex<State>,
}

/// Cheap to clone; clones drive the same session.
///
/// The state lock is only ever held between awaits, never across one.
#[derive(Clone)]
pub struct FormSession {
    inner: Arc<Inner>,
}

impl FormSession {
    pub fn open(
        env: &SessionEnv,
        form: Arc<FormDefinition>,
        key: FragmentKey,
        subject: Option<String>,
    ) -> Result<Self, SessionError> {
        if form.is_repeatable() {
            return Err(SessionError::Repeatable(form.name().to_string()));
        }
        env.binder(&form)?;

        let ctx = form.new_context().with_subject(subject);
        info!(form = form.name(), %key, "form session opened");

        Ok(Self {
            inner: Arc::new(Inner {
                env: env.clone(),
                form,
                key,
                alive: AtomicBool::new(true),
                state: Mutex::new(State {
                    ctx,
                    codings: CodingMemory::default(),
                    generation: 0,
                    edited_at: BTreeMap::new(),
                }),
            }),
        })
    }

    pub fn key(&self) -> &FragmentKey {
        &self.inner.key
    }

    pub fn form(&self) -> &FormDefinition {
        &self.inner.form
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Stop the session. Fetches and saves still in flight complete as
    /// no-ops.
    pub fn close(&self) {
        if self.inner.alive.swap(false, Ordering::SeqCst) {
            info!(key = %self.inner.key, "form session closed");
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

    /// Fetch the fragment and populate the form from it.
    ///
    /// Every field not edited since the fetch started takes the stored value,
    /// or becomes empty when the store has none. Fields the user edited after
    /// the fetch started keep the edited value.
    pub async fn load(&self) -> Result<LoadOutcome, SessionError> {
        self.ensure_alive()?;
        let started = self.state()?.generation;
        let keys = [self.inner.key.clone()];

        let fetched = match self.inner.env.gateway.fetch_fragments(&keys).await {
            Ok(fetched) => fetched,
            Err(e) => {
                if self.is_alive() {
                    self.emit(Diagnostic::PersistenceFailure {
                        keys: keys.to_vec(),
                        error: e.to_string(),
                    });
                }
                return Err(e.into());
            }
        };
        if !self.is_alive() {
            debug!(key = %self.inner.key, "fetch completed after close, ignored");
            return Ok(LoadOutcome::Abandoned);
        }

        let fragment = fetched
            .into_iter()
            .next()
            .unwrap_or_else(|| Fragment::empty(self.inner.key.clone()));

        let (discarded, drift) = {
            let binder = self.inner.env.binder(&self.inner.form)?;
            let populated = binder.populate(&fragment);

            let mut guard = self.state()?;
            let state = &mut *guard;
            let mut discarded = Vec::new();
            for spec in self.inner.form.fields() {
                let fetched = populated.values.get(&spec.id).cloned().unwrap_or_default();
                if state.edited_at.get(&spec.id).is_some_and(|&at| at > started) {
                    if !fetched.is_empty() {
                        discarded.push(spec.id.clone());
                    }
                    continue;
                }
                // Absent from the store means empty, not "keep what we had".
                state.ctx.set_value(&spec.id, fetched);
            }
            state.codings = populated.codings;
            self.inner.form.graph().initialize(&mut state.ctx);

            let stale: Vec<FieldId> = state.ctx.issues().map(|i| i.field.clone()).collect();
            for field in &stale {
                self.inner.form.revalidate(&mut state.ctx, field);
            }
            (discarded, populated.drift)
        };

        for drift in &drift {
            self.emit(Diagnostic::VocabularyDrift {
                key: self.inner.key.clone(),
                drift: drift.clone(),
            });
        }
        if !discarded.is_empty() {
            self.emit(Diagnostic::FetchDiscarded {
                key: self.inner.key.clone(),
                fields: discarded.clone(),
            });
        }

        info!(key = %self.inner.key, empty = fragment.is_empty(), "form loaded");
        Ok(LoadOutcome::Loaded {
            discarded,
            drift: drift.len(),
        })
    }

    /// Apply a user edit and propagate it through the dependency graph.
    pub fn set_field(&self, field: &str, value: FieldValue) -> Result<ChangeReport, SessionError> {
        self.ensure_alive()?;
        let mut guard = self.state()?;
        let state = &mut *guard;

        let report = self.inner.form.set_value(&mut state.ctx, field, value)?;
        state.generation += 1;
        state.edited_at.insert(FieldId::from(field), state.generation);
        Ok(report)
    }

    /// Parse typed text for `field` and apply it. Coded fields accept a
    /// code or a display label.
    pub fn set_field_text(&self, field: &str, text: &str) -> Result<ChangeReport, SessionError> {
        let value = {
            let binder = self.inner.env.binder(&self.inner.form)?;
            let state = self.state()?;
            binder.parse_input(field, text, &state.codings)?
        };
        self.set_field(field, value)
    }

    pub fn value(&self, field: &str) -> Result<FieldValue, SessionError> {
        let spec = self.inner.form.require_field(field)?;
        Ok(self.state()?.ctx.value(&spec.id).clone())
    }

    pub fn issues(&self) -> Result<Vec<ValidationIssue>, SessionError> {
        Ok(self.state()?.ctx.issues().cloned().collect())
    }

    pub fn snapshot(&self) -> Result<FormSnapshot, SessionError> {
        let binder = self.inner.env.binder(&self.inner.form)?;
        let state = self.state()?;
        Ok(FormSnapshot {
            form: self.inner.form.name().to_string(),
            key: self.inner.key.clone(),
            fields: snapshot::fields(&binder, &state.ctx),
        })
    }

    /// Validate, rebuild the fragment and save it.
    ///
    /// A fragment with meaningful data and validation issues is not saved. A
    /// fragment with no meaningful data is saved empty, which deletes it.
    pub async fn commit(&self) -> Result<CommitOutcome, SessionError> {
        self.ensure_alive()?;

        let (fragment, drift) = {
            let binder = self.inner.env.binder(&self.inner.form)?;
            let mut guard = self.state()?;
            let state = &mut *guard;

            if binder.has_meaningful_data(&state.ctx) {
                let issues = self.inner.form.validate_all(&mut state.ctx);
                if !issues.is_empty() {
                    self.emit(Diagnostic::CommitBlocked {
                        key: self.inner.key.clone(),
                        issues: issues.clone(),
                    });
                    return Ok(CommitOutcome::Blocked { issues });
                }
            }

            let mut fragment = Fragment::empty(self.inner.key.clone());
            let extracted = binder.extract(&state.ctx, &mut fragment, &state.codings);
            (fragment, extracted.drift)
        };

        for drift in drift {
            self.emit(Diagnostic::VocabularyDrift {
                key: self.inner.key.clone(),
                drift,
            });
        }

        let cleared = fragment.is_empty();
        let result = self
            .inner
            .env
            .queue
            .save(self.inner.env.gateway.as_ref(), fragment)
            .await;

        if !self.is_alive() {
            debug!(key = %self.inner.key, "save completed after close, ignored");
            return Ok(CommitOutcome::Abandoned);
        }

        match result {
            Ok(()) => {
                info!(key = %self.inner.key, cleared, "fragment committed");
                Ok(CommitOutcome::Saved { cleared })
            }
            Err(e) => {
                self.emit(Diagnostic::PersistenceFailure {
                    keys: vec![self.inner.key.clone()],
                    error: e.to_string(),
                });
                Ok(CommitOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }
}
