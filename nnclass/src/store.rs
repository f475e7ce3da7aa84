use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::codec::{self, Persisted};
use crate::error::StorageError;
use crate::model::Pipeline;

/// File extension of persisted model blobs.
pub const BLOB_EXTENSION: &str = "gzbin";

/// Raw blob persistence keyed by name.
///
/// Implementations must be safe for concurrent use. Use [`MemoryStore`]
/// for tests and [`FileStore`] for models that survive restarts.
pub trait BlobStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if there is none.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces whatever is stored under `key`.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Returns the readers-writer lock guarding `key`. The same lock is
    /// returned for the same key for the lifetime of the store.
    fn lock(&self, key: &str) -> Arc<RwLock<()>>;
}

/// One lock per key, created on first use.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl KeyLocks {
    fn get(&self, key: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}

/// Stores each blob as a file in one directory.
pub struct FileStore {
    dir: PathBuf,
    locks: KeyLocks,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            locks: KeyLocks::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BlobStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path(key);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash mid-write leaves the previous blob intact.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, data).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn lock(&self, key: &str) -> Arc<RwLock<()>> {
        self.locks.get(key)
    }
}

/// In-memory [`BlobStore`]. Data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    locks: KeyLocks,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn lock(&self, key: &str) -> Arc<RwLock<()>> {
        self.locks.get(key)
    }
}

/// Restores and dumps one classifier's model blob.
///
/// The blob key is `"<kind>.<preprocessing>.<extraction>.gzbin"`, so every
/// classifier kind and pipeline gets its own blob.
#[derive(Clone)]
pub struct ModelStore {
    backend: Arc<dyn BlobStore>,
    key: String,
    pipeline: Pipeline,
}

impl ModelStore {
    pub fn new(backend: Arc<dyn BlobStore>, kind: &str, pipeline: Pipeline) -> Self {
        Self {
            backend,
            key: format!("{kind}.{pipeline}.{BLOB_EXTENSION}"),
            pipeline,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    /// Readers-writer lock for this model's blob.
    pub fn lock(&self) -> Arc<RwLock<()>> {
        self.backend.lock(&self.key)
    }

    /// Loads the model. A missing blob yields an empty model, flagged by
    /// the returned bool being false.
    ///
    /// A blob recorded under a different pipeline is rejected.
    pub fn restore<M: Persisted>(&self) -> Result<(M, bool), StorageError> {
        let Some(blob) = self.backend.read(&self.key)? else {
            info!(key = %self.key, "no stored model, starting empty");
            return Ok((M::empty(self.pipeline), false));
        };

        let model: M = codec::decode(&blob)?;
        if model.pipeline() != self.pipeline {
            return Err(StorageError::Incompatible {
                stored: model.pipeline(),
                expected: self.pipeline,
            });
        }
        debug!(
            key = %self.key,
            bytes = blob.len(),
            records = model.record_count(),
            "restored model"
        );
        Ok((model, true))
    }

    /// Serializes the model over any previous blob.
    pub fn dump<M: Persisted>(&self, model: &M) -> Result<(), StorageError> {
        let blob = codec::encode(model)?;
        self.backend.write(&self.key, &blob)?;
        debug!(
            key = %self.key,
            bytes = blob.len(),
            records = model.record_count(),
            "dumped model"
        );
        Ok(())
    }
}
