//! medform-session
//!
//! Drives forms against a store: fetch → populate → edit → commit → extract
//! → save. Sessions are cloneable handles; edits are synchronous, fetches and
//! saves are the only await points.
//!
//! Public API:
//! - `SessionEnv`: catalogs, gateway, save queue and diagnostics shared by
//!   every session
//! - `FormSession`: one form over one fragment
//! - `GroupSession`: a repeatable form over an index fragment plus one
//!   fragment per entry
//! - `open_form()`: pick the right session for a built-in form

pub mod diagnostics;
pub mod env;
pub mod error;
pub mod form_session;
pub mod group_session;
pub mod outcome;
pub mod queue;
pub mod snapshot;

use std::sync::Arc;

use medform_core::FragmentKey;
use medform_forms::FormDefinition;

pub use crate::diagnostics::{Diagnostic, Diagnostics};
pub use crate::env::SessionEnv;
pub use crate::error::SessionError;
pub use crate::form_session::FormSession;
pub use crate::group_session::GroupSession;
pub use crate::outcome::{CommitOutcome, GroupCommitOutcome, GroupCommitReport, LoadOutcome};
pub use crate::queue::SaveQueue;
pub use crate::snapshot::{EntrySnapshot, FieldSnapshot, FormSnapshot, GroupSnapshot};

/// A session of whichever shape `form` needs.
#[derive(Clone)]
pub enum Session {
    Form(FormSession),
    Group(GroupSession),
}

/// Open and load a session for `form` at `key`. For repeatable forms `key`
/// addresses the group's index fragment.
pub async fn open_form(
    env: &SessionEnv,
    form: Arc<FormDefinition>,
    key: FragmentKey,
    subject: Option<String>,
) -> Result<(Session, LoadOutcome), SessionError> {
    if form.is_repeatable() {
        let session = GroupSession::open(env, form, key, subject)?;
        let outcome = session.load().await?;
        Ok((Session::Group(session), outcome))
    } else {
        let session = FormSession::open(env, form, key, subject)?;
        let outcome = session.load().await?;
        Ok((Session::Form(session), outcome))
    }
}

impl Session {
    pub fn close(&self) {
        match self {
            Session::Form(s) => s.close(),
            Session::Group(s) => s.close(),
        }
    }
}
