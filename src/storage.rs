//! Durable Blob Storage
//!
//! Preferences are persisted as one opaque blob under a fixed key.
//! `FileBlobStore` writes it to disk, `MemoryBlobStore` keeps it in memory
//! and can be told to fail for testing degraded paths.

use crate::{TuneError, TuneResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Fixed identifier of the preference blob
pub const PREFERENCES_KEY: &str = "preferences";

/// Blob store trait for the preference blob
pub trait BlobStore: Send + Sync {
    /// Read the blob, `None` if nothing has been written yet
    fn read(&self) -> TuneResult<Option<String>>;

    /// Replace the blob
    fn write(&self, blob: &str) -> TuneResult<()>;
}

/// File-backed store: `<dir>/preferences.json`
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", PREFERENCES_KEY)),
        }
    }

    /// Store under the user's config directory
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tunectl");
        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self) -> TuneResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TuneError::StorageUnavailable(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write(&self, blob: &str) -> TuneResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TuneError::StorageUnavailable(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Write-then-rename keeps the blob whole if we die halfway
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob).map_err(|e| {
            TuneError::StorageUnavailable(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            TuneError::StorageUnavailable(format!(
                "Failed to move {} into place: {}",
                tmp.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), bytes = blob.len(), "Wrote preference blob");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryBlob {
    blob: Option<String>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

/// In-memory store. Clones share the same blob.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<MemoryBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a blob
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().blob = Some(blob.into());
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Current blob contents, bypassing failure injection
    pub fn contents(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryBlob> {
        // A panicked test thread must not wedge the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self) -> TuneResult<Option<String>> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(TuneError::StorageUnavailable(
                "memory store read failure".to_string(),
            ));
        }
        Ok(inner.blob.clone())
    }

    fn write(&self, blob: &str) -> TuneResult<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(TuneError::StorageUnavailable(
                "memory store write failure".to_string(),
            ));
        }
        inner.blob = Some(blob.to_string());
        inner.writes += 1;
        Ok(())
    }
}
