//! Persistent store backends: shared in-memory blob and atomic file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use escapement_traits::{BoxError, PersistentStore};

use crate::error::HwError;
use crate::util::write_atomic;

#[derive(Debug, Default)]
struct MemoryInner {
    bytes: Option<Vec<u8>>,
    fail_saves: bool,
    saves: u64,
}

/// In-memory store. Clones share the same blob so a test can inspect or
/// tamper with what the controller wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        let store = Self::default();
        store.set_bytes(Some(bytes));
        store
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.inner.lock().ok().and_then(|g| g.bytes.clone())
    }

    pub fn set_bytes(&self, bytes: Option<Vec<u8>>) {
        if let Ok(mut g) = self.inner.lock() {
            g.bytes = bytes;
        }
    }

    /// Make subsequent saves fail (simulating a dead medium).
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut g) = self.inner.lock() {
            g.fail_saves = fail;
        }
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u64 {
        self.inner.lock().map(|g| g.saves).unwrap_or(0)
    }
}

impl PersistentStore for MemoryStore {
    fn load(&mut self) -> Result<Option<Vec<u8>>, BoxError> {
        let g = self
            .inner
            .lock()
            .map_err(|_| HwError::Store("memory store poisoned".into()))?;
        Ok(g.bytes.clone())
    }

    fn save(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| HwError::Store("memory store poisoned".into()))?;
        if g.fail_saves {
            return Err(Box::new(HwError::Store("write refused".into())));
        }
        g.bytes = Some(bytes.to_vec());
        g.saves += 1;
        Ok(())
    }
}

/// Store backed by a single file, replaced atomically on every save.
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
}

impl PersistentStore for FileStore {
    fn load(&mut self) -> Result<Option<Vec<u8>>, BoxError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }

    fn save(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(HwError::Io)?;
        }
        write_atomic(&self.path, bytes).map_err(HwError::Io)?;
        tracing::debug!(path = %self.path.display(), len = bytes.len(), "record written");
        Ok(())
    }
}
