//! Durable key-value storage for session state
//!
//! A small synchronous string map shared by the token store and the task
//! timer. `FileStore` keeps the map in memory and rewrites a JSON file on
//! every mutation using atomic temp-file + rename, so a crash mid-write never
//! leaves a truncated file behind. A std Mutex serializes writers; no lock is
//! ever held across an `.await`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::StorageError;

type StorageResult<T> = std::result::Result<T, StorageError>;

/// Synchronous string key-value storage.
///
/// Writes are last-write-wins. The multi-entry methods apply all entries in
/// one step; the defaults fall back to one call per entry.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;

    fn set_entries(&self, entries: Vec<(&str, String)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove_entries(&self, keys: &[&str]) -> StorageResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// JSON-file backed store.
///
/// The file is the single source of truth across process restarts. It is
/// read once at open; afterwards the in-memory map is authoritative and
/// every mutation persists the whole map.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start, nobody
    /// logged in yet). Parent directories are created as needed.
    pub fn open(path: PathBuf) -> StorageResult<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| StorageError(format!("reading storage file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| StorageError(format!("parsing storage file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded session storage");
            entries
        } else {
            info!(path = %path.display(), "storage file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.set_entries(vec![(key, value)])
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.remove_entries(&[key])
    }

    fn set_entries(&self, entries: Vec<(&str, String)>) -> StorageResult<()> {
        let mut state = self.lock();
        for (key, value) in entries {
            debug!(key, "storing entry");
            state.insert(key.to_string(), value);
        }
        write_atomic(&self.path, &state)
    }

    fn remove_entries(&self, keys: &[&str]) -> StorageResult<()> {
        let mut state = self.lock();
        let mut changed = false;
        for key in keys {
            if state.remove(*key).is_some() {
                debug!(key, "removed entry");
                changed = true;
            }
        }
        if changed {
            write_atomic(&self.path, &state)?;
        }
        Ok(())
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn set_entries(&self, entries: Vec<(&str, String)>) -> StorageResult<()> {
        let mut state = self.lock();
        for (key, value) in entries {
            state.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn remove_entries(&self, keys: &[&str]) -> StorageResult<()> {
        let mut state = self.lock();
        for key in keys {
            state.remove(*key);
        }
        Ok(())
    }
}

/// Write the map to `path` atomically.
///
/// Writes a temporary file in the same directory, then renames it over the
/// target. Permissions are 0600 (owner read/write only) since the file holds
/// bearer tokens.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> StorageResult<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| StorageError(format!("serializing storage: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| StorageError("storage path has no parent directory".into()))?;
    std::fs::create_dir_all(dir)
        .map_err(|e| StorageError(format!("creating storage directory: {e}")))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "storage".into());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| StorageError(format!("writing temp storage file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| StorageError(format!("setting storage file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| StorageError(format!("renaming temp storage file: {e}")))?;

    debug!(path = %path.display(), "persisted session storage");
    Ok(())
}
