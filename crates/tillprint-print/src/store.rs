// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisted print server address.
//
// The address lives under a single key. Reads re-normalise whatever was
// stored so a corrupted value or a change in default-port policy heals on
// the next read instead of breaking the client. Writes come only from the
// operator's explicit save/reset, so last-write-wins is enough.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use tillprint_core::error::{Result, TillprintError};
use tillprint_core::types::ServerEndpoint;

use crate::normalize::normalize;

/// Single-key persistence for the print server address.
pub trait SettingStore: Send + Sync {
    /// Return the stored value, or `None` if nothing is stored.
    fn load(&self) -> Result<Option<String>>;
    /// Replace the stored value.
    fn store(&self, value: &str) -> Result<()>;
    /// Remove the stored value.
    fn clear(&self) -> Result<()>;
}

/// In-memory store, used in tests and when no data directory is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the store, e.g. to simulate a value left by an older release.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl SettingStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        self.value
            .lock()
            .map(|v| v.clone())
            .map_err(|e| TillprintError::Storage(format!("lock poisoned: {e}")))
    }

    fn store(&self, value: &str) -> Result<()> {
        let mut slot = self
            .value
            .lock()
            .map_err(|e| TillprintError::Storage(format!("lock poisoned: {e}")))?;
        *slot = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .value
            .lock()
            .map_err(|e| TillprintError::Storage(format!("lock poisoned: {e}")))?;
        *slot = None;
        Ok(())
    }
}

/// On-disk layout of the settings file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    print_server_url: Option<String>,
}

/// JSON settings file in the application data directory.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// concurrent reader sees either the old or the new value, never a mix.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "print-server.json";

    /// Store settings at `path` (the file need not exist yet).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store settings as [`Self::FILE_NAME`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, file: &SettingsFile) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let json = serde_json::to_vec_pretty(file)?;
        // Each writer gets its own temp file, so concurrent saves race only
        // on the final rename.
        let mut tmp = tempfile::Builder::new()
            .prefix(".print-server.")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp.write_all(&json)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SettingStore for JsonFileStore {
    fn load(&self) -> Result<Option<String>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: SettingsFile = serde_json::from_slice(&bytes)?;
        Ok(file.print_server_url)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn store(&self, value: &str) -> Result<()> {
        self.write_file(&SettingsFile {
            print_server_url: Some(value.to_string()),
        })?;
        debug!("print server address written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("print server settings removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The operator's saved print server address.
///
/// Cheap to clone; all clones share the same backing store.
#[derive(Clone)]
pub struct ConfigStore {
    backend: Arc<dyn SettingStore>,
}

impl ConfigStore {
    pub fn new(backend: Arc<dyn SettingStore>) -> Self {
        Self { backend }
    }

    /// A store that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The address requests should go to right now.
    ///
    /// Falls back to `http://localhost:3001` when nothing usable is stored,
    /// including when the backend itself fails to read.
    pub fn get(&self) -> ServerEndpoint {
        match self.backend.load() {
            Ok(Some(stored)) => normalize(&stored).unwrap_or_default(),
            Ok(None) => ServerEndpoint::default(),
            Err(e) => {
                warn!(error = %e, "could not read saved print server address, using default");
                ServerEndpoint::default()
            }
        }
    }

    /// Whether an address has been saved (as opposed to using the default).
    pub fn is_customised(&self) -> bool {
        match self.backend.load() {
            Ok(Some(stored)) => normalize(&stored).is_some(),
            _ => false,
        }
    }

    /// Normalise and persist operator input.
    ///
    /// Blank input clears the saved address and returns `None`. Unparseable
    /// input is still saved; it surfaces later as a connectivity failure.
    pub fn save(&self, raw: &str) -> Result<Option<ServerEndpoint>> {
        match normalize(raw) {
            Some(endpoint) => {
                self.backend.store(&endpoint.to_string())?;
                info!(address = %endpoint, "print server address saved");
                Ok(Some(endpoint))
            }
            None => {
                self.reset()?;
                Ok(None)
            }
        }
    }

    /// Forget the saved address and revert to the default.
    pub fn reset(&self) -> Result<()> {
        self.backend.clear()?;
        info!("print server address reset to default");
        Ok(())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}
