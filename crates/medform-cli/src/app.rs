//! Start-up wiring: vocabularies, catalogs, the fragment store and the
//! shared session environment.

use std::sync::Arc;

use eyre::WrapErr;
use medform_core::{FragmentKey, Path};
use medform_forms::{FormDefinition, all_forms};
use medform_session::SessionEnv;
use medform_storage::{JsonFileGateway, PersistenceGateway};
use medform_vocab::{Catalogs, VocabularyRegistry};
use uuid::Uuid;

use crate::config::MedformConfig;

pub struct App {
    pub config: MedformConfig,
    pub registry: VocabularyRegistry,
    pub forms: Vec<Arc<FormDefinition>>,
    pub env: SessionEnv,
}

impl App {
    /// Load vocabularies, build catalogs for every built-in form and open the
    /// store named by `config`.
    pub fn start(config: MedformConfig) -> eyre::Result<Self> {
        let registry = load_registry(&config)?;
        let forms = all_forms()?;

        let ids: Vec<&str> = forms.iter().flat_map(|f| f.vocabularies()).collect();
        let catalogs = Catalogs::load(&registry, ids)?;

        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(JsonFileGateway::new(config.store_dir.clone()));
        let env = SessionEnv::new(Arc::new(catalogs), gateway);

        tracing::info!(
            store = %config.store_dir.display(),
            vocabularies = registry.len(),
            forms = forms.len(),
            "medform started"
        );
        Ok(Self {
            config,
            registry,
            forms,
            env,
        })
    }

    pub fn form(&self, name: &str) -> eyre::Result<Arc<FormDefinition>> {
        self.forms
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or_else(|| eyre::eyre!("unknown form '{name}'"))
    }

    pub fn subject(&self) -> Option<String> {
        self.config.subject_reference.clone()
    }
}

/// Built-in tables plus every configured vocabulary file.
pub fn load_registry(config: &MedformConfig) -> eyre::Result<VocabularyRegistry> {
    let mut registry = VocabularyRegistry::builtin();
    for path in &config.vocabulary_files {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading vocabulary file {}", path.display()))?;
        let added = registry
            .load_json_str(&json)
            .wrap_err_with(|| format!("loading vocabulary file {}", path.display()))?;
        tracing::info!(path = %path.display(), added, "vocabulary file loaded");
    }
    Ok(registry)
}

/// Resource path of a repeatable form's index fragment, e.g. `DeviceIndex`.
pub fn index_resource(form: &FormDefinition) -> Path {
    Path::field(format!("{}Index", form.resource()))
}

/// Key a session for `form` opens at: the fragment itself, or the group's
/// index fragment for repeatable forms.
pub fn session_key(form: &FormDefinition, instance: Uuid) -> FragmentKey {
    if form.is_repeatable() {
        FragmentKey::new(instance, index_resource(form))
    } else {
        FragmentKey::new(instance, form.resource().clone())
    }
}

/// Resource path `list` filters on for `form`.
pub fn listed_resource(form: &FormDefinition) -> Path {
    if form.is_repeatable() {
        index_resource(form)
    } else {
        form.resource().clone()
    }
}

