//! Locally-resolvable handles to in-memory bytes.
//!
//! An [`ObjectUrl`] stays resolvable until it is dropped or revoked, so
//! previews and download staging never outlive their owner.

use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use crate::error::DownloadError;

const OBJECT_URL_PREFIX: &str = "blob:imagegen/";

struct ObjectEntry {
    bytes: Arc<[u8]>,
    mime_type: String,
}

#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    entries: Arc<Mutex<HashMap<String, ObjectEntry>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, bytes: Arc<[u8]>, mime_type: impl Into<String>) -> ObjectUrl {
        let url = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        let entry = ObjectEntry {
            bytes,
            mime_type: mime_type.into(),
        };
        self.lock().insert(url.clone(), entry);
        debug!(%url, "object url created");
        ObjectUrl {
            url,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.lock().get(url).map(|entry| entry.bytes.clone())
    }

    pub fn mime_type(&self, url: &str) -> Option<String> {
        self.lock().get(url).map(|entry| entry.mime_type.clone())
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, url: &str) {
        if self.lock().remove(url).is_some() {
            debug!(%url, "object url released");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ObjectEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped acquisition of a registry entry.
pub struct ObjectUrl {
    url: String,
    registry: ObjectUrlRegistry,
}

impl ObjectUrl {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.registry.resolve(&self.url)
    }

    pub fn revoke(self) {}
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}

impl std::fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.url).finish()
    }
}

/// Saves the bytes behind `object` into `dir/filename`.
///
/// The bytes land in a temporary file inside `dir` first and are renamed
/// into place, so the target is either fully written or untouched.
pub async fn save_as(
    object: &ObjectUrl,
    dir: &Path,
    filename: &str,
) -> Result<PathBuf, DownloadError> {
    let bytes = object
        .bytes()
        .ok_or_else(|| DownloadError::Released(object.url().to_string()))?;
    let dir = dir.to_path_buf();
    let target = dir.join(filename);

    let join_target = target.clone();
    tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &bytes))
        .await
        .map_err(|e| DownloadError::Save {
            path: join_target,
            source: std::io::Error::other(e.to_string()),
        })?
}

fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
    let save_err = |source: std::io::Error| DownloadError::Save {
        path: target.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(save_err)?;
    let mut staged = NamedTempFile::new_in(dir).map_err(save_err)?;
    staged.write_all(bytes).map_err(save_err)?;
    staged.flush().map_err(save_err)?;
    staged.persist(target).map_err(|e| save_err(e.error))?;
    Ok(target.to_path_buf())
}
