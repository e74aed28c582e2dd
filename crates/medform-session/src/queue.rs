//! Per-key save serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use medform_core::{Fragment, FragmentKey};
use medform_storage::{PersistenceGateway, StorageError};
use tokio::sync::Mutex;

/// Saves for one fragment key run one at a time, in submission order
/// (tokio's mutex is FIFO), so the last submitted save is the one that
/// sticks. Saves for different keys run freely.
#[derive(Debug, Default)]
pub struct SaveQueue {
    slots: StdMutex<HashMap<FragmentKey, Arc<Mutex<()>>>>,
}

impl SaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<FragmentKey, Arc<Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &FragmentKey) -> Arc<Mutex<()>> {
        Arc::clone(self.slots().entry(key.clone()).or_default())
    }

    /// Forget `key`'s slot unless another save is holding or waiting on it.
    fn release(&self, key: &FragmentKey, slot: Arc<Mutex<()>>) {
        let mut slots = self.slots();
        // One reference in the map, one here.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
    }

    /// Keys with a save running or queued.
    pub fn pending(&self) -> usize {
        self.slots().len()
    }

    pub async fn save(
        &self,
        gateway: &dyn PersistenceGateway,
        fragment: Fragment,
    ) -> Result<(), StorageError> {
        let key = fragment.key.clone();
        let slot = self.slot(&key);
        let result = {
            let _turn = slot.lock().await;
            tracing::debug!(%key, "saving fragment");
            gateway.save_fragments(vec![fragment]).await
        };
        self.release(&key, slot);
        result
    }
}
