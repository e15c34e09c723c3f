use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::Context;

use crate::foundation::error::FramixResult;

/// Secondary storage for spilled cache payloads.
///
/// The cache core only needs "store bytes under a key, retrieve bytes by key,
/// report failure"; the on-disk layout is an implementation detail of the
/// backend.
pub trait SpillStorage: Send + Sync {
    /// Persist `bytes` under `key`, replacing any previous content.
    fn write(&self, key: u64, bytes: &[u8]) -> FramixResult<()>;

    /// Retrieve the bytes previously stored under `key`.
    fn read(&self, key: u64) -> FramixResult<Vec<u8>>;

    /// Drop the bytes stored under `key`, if any. Best-effort.
    fn remove(&self, key: u64);
}

/// Filesystem-backed spill storage rooted in a per-session directory.
///
/// The directory and its contents are removed when the storage is dropped.
#[derive(Debug)]
pub struct FsSpillStorage {
    dir: PathBuf,
}

impl FsSpillStorage {
    /// Create a session spill directory under the system temp dir.
    pub fn new_session() -> FramixResult<Self> {
        let dir = std::env::temp_dir().join(format!(
            "framix_spill_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        Self::at_dir(dir)
    }

    /// Create spill storage rooted at an explicit directory.
    pub fn at_dir(dir: impl Into<PathBuf>) -> FramixResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create spill directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: u64) -> PathBuf {
        self.dir.join(format!("{key:016x}.bin"))
    }
}

impl SpillStorage for FsSpillStorage {
    fn write(&self, key: u64, bytes: &[u8]) -> FramixResult<()> {
        let path = self.path_for(key);
        std::fs::write(&path, bytes)
            .with_context(|| format!("write spill file '{}'", path.display()))?;
        Ok(())
    }

    fn read(&self, key: u64) -> FramixResult<Vec<u8>> {
        let path = self.path_for(key);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read spill file '{}'", path.display()))?;
        Ok(bytes)
    }

    fn remove(&self, key: u64) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

impl Drop for FsSpillStorage {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// In-memory spill storage, mostly useful in tests and short sessions.
#[derive(Debug, Default)]
pub struct MemSpillStorage {
    map: Mutex<HashMap<u64, Vec<u8>>>,
}

impl MemSpillStorage {
    /// Create empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.map.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpillStorage for MemSpillStorage {
    fn write(&self, key: u64, bytes: &[u8]) -> FramixResult<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| crate::FramixError::cache("spill storage lock poisoned"))?;
        map.insert(key, bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: u64) -> FramixResult<Vec<u8>> {
        let map = self
            .map
            .lock()
            .map_err(|_| crate::FramixError::cache("spill storage lock poisoned"))?;
        map.get(&key)
            .cloned()
            .ok_or_else(|| crate::FramixError::cache(format!("no spill bytes under key {key:#x}")))
    }

    fn remove(&self, key: u64) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(&key);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/storage.rs"]
mod tests;
