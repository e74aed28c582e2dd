use std::sync::Arc;

use medform_forms::{FieldBinder, FormDefinition};
use medform_storage::PersistenceGateway;
use medform_vocab::Catalogs;

use crate::diagnostics::Diagnostics;
use crate::error::SessionError;
use crate::queue::SaveQueue;

/// What every session of one running application shares: catalogs loaded at
/// start-up, the store, the save queue and the diagnostics channel.
#[derive(Clone)]
pub struct SessionEnv {
    pub catalogs: Arc<Catalogs>,
    pub gateway: Arc<dyn PersistenceGateway>,
    pub queue: Arc<SaveQueue>,
    pub diagnostics: Diagnostics,
}

impl SessionEnv {
    pub fn new(catalogs: Arc<Catalogs>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            catalogs,
            gateway,
            queue: Arc::new(SaveQueue::new()),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Binder for `form` over the shared catalogs.
    pub fn binder<'a>(&'a self, form: &'a FormDefinition) -> Result<FieldBinder<'a>, SessionError> {
        Ok(FieldBinder::new(form, &self.catalogs)?)
    }
}
