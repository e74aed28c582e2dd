use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use medform_core::{Fragment, FragmentKey, Path, PathRecord};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::gateway::{BoxFuture, PersistenceGateway};

#[derive(Debug, Default)]
struct Faults {
    fetch_latency: Duration,
    save_latency: Duration,
    failing_keys: BTreeSet<FragmentKey>,
    fail_fetches: bool,
}

/// Fragments held in a map. Cloning shares the map.
///
/// Latency and failures can be injected so callers can exercise slow or
/// broken stores.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    fragments: Arc<Mutex<BTreeMap<FragmentKey, Value>>>,
    faults: Arc<StdMutex<Faults>>,
    saves: Arc<StdMutex<Vec<Fragment>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `fragment` directly, bypassing fault injection.
    pub async fn insert(&self, fragment: Fragment) {
        let mut fragments = self.fragments.lock().await;
        if fragment.is_empty() {
            fragments.remove(&fragment.key);
        } else {
            fragments.insert(fragment.key, fragment.body);
        }
    }

    pub async fn get(&self, key: &FragmentKey) -> Option<Fragment> {
        let fragments = self.fragments.lock().await;
        fragments
            .get(key)
            .map(|body| Fragment::with_body(key.clone(), body.clone()))
    }

    pub async fn len(&self) -> usize {
        self.fragments.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.fragments.lock().await.is_empty()
    }

    /// Every fragment passed to `save_fragments` so far, in call order,
    /// including failed ones.
    pub fn save_log(&self) -> Vec<Fragment> {
        self.saves.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn with_faults(&self, f: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.faults.lock() {
            f(&mut faults);
        }
    }

    fn read_faults<T>(&self, f: impl FnOnce(&Faults) -> T) -> Option<T> {
        self.faults.lock().ok().map(|faults| f(&faults))
    }

    pub fn set_fetch_latency(&self, latency: Duration) {
        self.with_faults(|f| f.fetch_latency = latency);
    }

    pub fn set_save_latency(&self, latency: Duration) {
        self.with_faults(|f| f.save_latency = latency);
    }

    /// Make every save touching `key` fail until cleared.
    pub fn fail_saves_for(&self, key: FragmentKey) {
        self.with_faults(|f| {
            f.failing_keys.insert(key);
        });
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.with_faults(|f| f.fail_fetches = fail);
    }

    pub fn clear_faults(&self) {
        self.with_faults(|f| *f = Faults::default());
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn fetch_fragments<'a>(
        &'a self,
        keys: &'a [FragmentKey],
    ) -> BoxFuture<'a, Result<Vec<Fragment>, StorageError>> {
        let (latency, fail) = self
            .read_faults(|f| (f.fetch_latency, f.fail_fetches))
            .unwrap_or_default();

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if fail {
                return Err(StorageError::Unavailable("fetch failure injected".into()));
            }

            let fragments = self.fragments.lock().await;
            Ok(keys
                .iter()
                .map(|key| match fragments.get(key) {
                    Some(body) => Fragment::with_body(key.clone(), body.clone()),
                    None => Fragment::empty(key.clone()),
                })
                .collect())
        })
    }

    fn save_fragments(&self, fragments: Vec<Fragment>) -> BoxFuture<'_, Result<(), StorageError>> {
        let (latency, failing) = self
            .read_faults(|f| {
                let failing = fragments
                    .iter()
                    .find(|fr| f.failing_keys.contains(&fr.key))
                    .map(|fr| fr.key.to_string());
                (f.save_latency, failing)
            })
            .unwrap_or_default();
        if let Ok(mut saves) = self.saves.lock() {
            saves.extend(fragments.iter().cloned());
        }

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if let Some(key) = failing {
                return Err(StorageError::Unavailable(format!(
                    "save failure injected for {key}"
                )));
            }

            let mut stored = self.fragments.lock().await;
            for fragment in fragments {
                if fragment.is_empty() {
                    stored.remove(&fragment.key);
                } else {
                    stored.insert(fragment.key, fragment.body);
                }
            }
            Ok(())
        })
    }

    fn list_keys<'a>(
        &'a self,
        resource: Option<&'a Path>,
    ) -> BoxFuture<'a, Result<Vec<FragmentKey>, StorageError>> {
        Box::pin(async move {
            let fragments = self.fragments.lock().await;
            Ok(fragments
                .keys()
                .filter(|k| resource.is_none_or(|r| &k.resource == r))
                .cloned()
                .collect())
        })
    }
}
