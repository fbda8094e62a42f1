// SPDX-License-Identifier: MPL-2.0

//! # Persistence Providers
//!
//! The store saves the whole dashboard as one JSON document under a single
//! key after every mutation. This module defines the provider seam and two
//! implementations:
//!
//! - [`JsonFileStore`]: one pretty-printed JSON file per key in the user's
//!   data directory, e.g. `~/.local/share/weather-dashboard/weatherDashboard.json`
//! - [`MemoryStore`]: keeps the serialized document in memory. Used by tests
//!   and for throwaway sessions.
//!
//! # Failure Policy
//!
//! Providers report failures as [`PersistenceError`]; deciding what to do
//! about them (fall back to defaults, notify the user) is the store's job.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PersistenceError;

use super::model::PersistedDocument;

/// Key the dashboard state is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "weatherDashboard";

/// Durable key-value storage for the full dashboard document.
pub trait PersistenceAdapter: Send {
    /// Read the saved document. `Ok(None)` means nothing was ever saved.
    fn load(&self) -> Result<Option<PersistedDocument>, PersistenceError>;

    /// Replace the saved document.
    fn save(&mut self, document: &PersistedDocument) -> Result<(), PersistenceError>;
}

/// Default directory for saved state.
///
/// Falls back to `/tmp` if the data directory cannot be determined.
pub fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    path.push("weather-dashboard");
    path
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    key: String,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Full path of the file backing this key.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }
}

impl PersistenceAdapter for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedDocument>, PersistenceError> {
        let path = self.path();
        if !path.exists() {
            log::debug!("No saved state at {:?}", path);
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| PersistenceError::ReadFailed(format!("{}: {}", path.display(), e)))?;
        let document = serde_json::from_str(&content)
            .map_err(|e| PersistenceError::ReadFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Some(document))
    }

    fn save(&mut self, document: &PersistedDocument) -> Result<(), PersistenceError> {
        let write_failed = |e: &dyn std::fmt::Display| PersistenceError::WriteFailed(e.to_string());

        fs::create_dir_all(&self.dir).map_err(|e| write_failed(&e))?;
        let json = serde_json::to_string_pretty(document).map_err(|e| write_failed(&e))?;

        // Write next to the target and rename so a crash never leaves half a file
        let path = self.path();
        let tmp = temp_path(&path);
        fs::write(&tmp, json).map_err(|e| write_failed(&e))?;
        fs::rename(&tmp, &path).map_err(|e| write_failed(&e))?;

        log::debug!("Saved dashboard state to {:?}", path);
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

// ============================================================================
// In-Memory Store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    raw: Option<String>,
    saves: usize,
    fail_writes: bool,
}

/// In-memory provider. Clones share the same backing slot, so a test can
/// hand one clone to the store and inspect what was written via another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `document` already saved.
    pub fn with_document(document: &PersistedDocument) -> Self {
        let store = Self::new();
        store.lock().raw = serde_json::to_string(document).ok();
        store
    }

    /// Start with arbitrary saved text, e.g. a corrupt document.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().raw = Some(raw.into());
        store
    }

    /// The last saved document, if any and if it parses.
    pub fn document(&self) -> Option<PersistedDocument> {
        let raw = self.lock().raw.clone()?;
        serde_json::from_str(&raw).ok()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Make every following save fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceAdapter for MemoryStore {
    fn load(&self) -> Result<Option<PersistedDocument>, PersistenceError> {
        match self.lock().raw.as_deref() {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| PersistenceError::ReadFailed(e.to_string())),
        }
    }

    fn save(&mut self, document: &PersistedDocument) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(PersistenceError::WriteFailed("storage quota exceeded".into()));
        }
        let json = serde_json::to_string(document)
            .map_err(|e| PersistenceError::WriteFailed(e.to_string()))?;
        inner.raw = Some(json);
        inner.saves += 1;
        Ok(())
    }
}
