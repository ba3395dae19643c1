//! Byte storage for document attachments.
//!
//! The engine only tracks document metadata; the bytes live behind a
//! [`DocumentStore`] addressed by an opaque storage key. Stores may block:
//! the engine calls them on tokio's blocking pool.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{EngineError, ResultEngine};

pub trait DocumentStore: fmt::Debug {
    fn put(&self, key: &str, bytes: &[u8]) -> ResultEngine<()>;
    fn get(&self, key: &str) -> ResultEngine<Vec<u8>>;
    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> ResultEngine<()>;
}

/// Stores each document as a file named after its key under `root`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> ResultEngine<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> ResultEngine<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(EngineError::Storage(format!("invalid storage key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

impl DocumentStore for FsDocumentStore {
    fn put(&self, key: &str, bytes: &[u8]) -> ResultEngine<()> {
        fs::write(self.path(key)?, bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> ResultEngine<Vec<u8>> {
        Ok(fs::read(self.path(key)?)?)
    }

    fn delete(&self, key: &str) -> ResultEngine<()> {
        match fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDocumentStore {
    fn blobs(&self) -> ResultEngine<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| EngineError::Storage("document store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.blobs().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn put(&self, key: &str, bytes: &[u8]) -> ResultEngine<()> {
        self.blobs()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> ResultEngine<Vec<u8>> {
        self.blobs()?
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::Storage(format!("missing document bytes '{key}'")))
    }

    fn delete(&self, key: &str) -> ResultEngine<()> {
        self.blobs()?.remove(key);
        Ok(())
    }
}
