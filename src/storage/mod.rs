//! Byte source boundary: fetches the raw bytes of a stored document.
//!
//! The pipeline only ever reads through `ByteSource`; where bytes live
//! (local disk, an in-process map, an object store) is the caller's choice.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid storage locator: {0}")]
    InvalidLocator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("byte source lock poisoned")]
    LockPoisoned,
}

/// Supplies the bytes for a storage locator. Blocking; called once per attempt.
pub trait ByteSource: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError>;
}

/// Reads objects from a directory tree. Locators are paths relative to `root`.
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a locator under the root, refusing anything that could escape it.
    fn resolve(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(locator);
        if locator.trim().is_empty() {
            return Err(StorageError::InvalidLocator("empty locator".into()));
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StorageError::InvalidLocator(locator.to_string())),
            }
        }

        Ok(self.root.join(relative))
    }
}

impl ByteSource for LocalFileSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(locator)?;

        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(locator, size = bytes.len(), "Fetched object from disk");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process byte source keyed by locator.
#[derive(Default)]
pub struct MemoryByteSource {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        locator: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(|_| StorageError::LockPoisoned)?;
        objects.insert(locator.into(), bytes.into());
        Ok(())
    }

    pub fn remove(&self, locator: &str) -> Result<bool, StorageError> {
        let mut objects = self.objects.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(objects.remove(locator).is_some())
    }
}

impl ByteSource for MemoryByteSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.read().map_err(|_| StorageError::LockPoisoned)?;
        objects
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }
}
