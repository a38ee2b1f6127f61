//! Local customer identifier storage.
//!
//! The identifier is generated on the customer's side the first time an order
//! is placed and persisted locally. It is not authenticated.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClientResult;

/// Source of the local customer identifier.
///
/// Read on every event, so a changed identifier applies immediately.
pub trait CustomerStore: Send + Sync {
    fn customer_identifier(&self) -> Option<String>;
}

impl<T: CustomerStore + ?Sized> CustomerStore for Arc<T> {
    fn customer_identifier(&self) -> Option<String> {
        (**self).customer_identifier()
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identifier: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: RwLock::new(Some(identifier.into())),
        }
    }

    pub fn set(&self, identifier: impl Into<String>) {
        if let Ok(mut guard) = self.identifier.write() {
            *guard = Some(identifier.into());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.identifier.write() {
            *guard = None;
        }
    }
}

impl CustomerStore for MemoryStore {
    fn customer_identifier(&self) -> Option<String> {
        self.identifier.read().ok().and_then(|guard| guard.clone())
    }
}

/// File-backed store holding the identifier as plain text.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the stored identifier, generating and persisting one if absent.
    pub fn ensure_identifier(&self) -> ClientResult<String> {
        if let Some(existing) = self.customer_identifier() {
            return Ok(existing);
        }

        let identifier = Uuid::new_v4().to_string();
        self.store(&identifier)?;
        info!(path = %self.path.display(), "Generated new customer identifier");
        Ok(identifier)
    }

    /// Overwrite the stored identifier.
    pub fn store(&self, identifier: &str) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, identifier)?;
        Ok(())
    }
}

impl CustomerStore for FileStore {
    fn customer_identifier(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Some(text.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No stored customer identifier");
                None
            }
        }
    }
}
