use std::io::ErrorKind;
use std::path::{Path as FsPath, PathBuf};

use medform_core::{Fragment, FragmentKey, Path, PathRecord};

use crate::error::StorageError;
use crate::gateway::{BoxFuture, PersistenceGateway};

const EXTENSION: &str = "json";

/// One pretty-printed JSON file per fragment, named `<key>.json`, in a
/// single directory.
#[derive(Debug, Clone)]
pub struct JsonFileGateway {
    dir: PathBuf,
}

impl JsonFileGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &FsPath {
        &self.dir
    }

    fn file_for(&self, key: &FragmentKey) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    async fn read_one(&self, key: &FragmentKey) -> Result<Fragment, StorageError> {
        let path = self.file_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Fragment::empty(key.clone())),
            Err(e) => return Err(e.into()),
        };

        let fragment: Fragment = serde_json::from_slice(&bytes)?;
        if &fragment.key != key {
            return Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: format!("file holds fragment {}", fragment.key),
            });
        }
        Ok(fragment)
    }

    /// Write atomically: tmp file + rename.
    async fn write_one(&self, fragment: &Fragment) -> Result<(), StorageError> {
        let path = self.file_for(&fragment.key);

        if fragment.is_empty() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(key = %fragment.key, "fragment deleted"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        let json = serde_json::to_vec_pretty(fragment)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp_path = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(key = %fragment.key, path = %path.display(), "fragment written");
        Ok(())
    }
}

impl PersistenceGateway for JsonFileGateway {
    fn fetch_fragments<'a>(
        &'a self,
        keys: &'a [FragmentKey],
    ) -> BoxFuture<'a, Result<Vec<Fragment>, StorageError>> {
        Box::pin(async move {
            let mut fragments = Vec::with_capacity(keys.len());
            for key in keys {
                fragments.push(self.read_one(key).await?);
            }
            Ok(fragments)
        })
    }

    fn save_fragments(&self, fragments: Vec<Fragment>) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move {
            for fragment in &fragments {
                self.write_one(fragment).await?;
            }
            Ok(())
        })
    }

    fn list_keys<'a>(
        &'a self,
        resource: Option<&'a Path>,
    ) -> BoxFuture<'a, Result<Vec<FragmentKey>, StorageError>> {
        Box::pin(async move {
            let mut entries = match tokio::fs::read_dir(&self.dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut keys = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(stem) = name
                    .to_str()
                    .and_then(|n| n.strip_suffix(&format!(".{EXTENSION}")))
                else {
                    continue;
                };
                match FragmentKey::parse(stem) {
                    Ok(key) if resource.is_none_or(|r| &key.resource == r) => keys.push(key),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(file = %entry.path().display(), error = %e, "skipping unrecognized file");
                    }
                }
            }
            keys.sort();
            Ok(keys)
        })
    }
}
