use std::future::Future;
use std::pin::Pin;

use medform_core::{Fragment, FragmentKey, Path};

use crate::error::StorageError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where fragments live between sessions.
pub trait PersistenceGateway: Send + Sync {
    /// One fragment per key, in key order. Keys with nothing stored come back
    /// as empty fragments.
    fn fetch_fragments<'a>(
        &'a self,
        keys: &'a [FragmentKey],
    ) -> BoxFuture<'a, Result<Vec<Fragment>, StorageError>>;

    /// Store each fragment. An empty fragment deletes whatever is stored
    /// under its key.
    fn save_fragments(&self, fragments: Vec<Fragment>) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Keys of every stored fragment, optionally only those of one resource
    /// kind. Sorted.
    fn list_keys<'a>(
        &'a self,
        resource: Option<&'a Path>,
    ) -> BoxFuture<'a, Result<Vec<FragmentKey>, StorageError>>;
}
