//! Durable sync state
//!
//! Persists the single boolean that gates initial-sync semantics across
//! process restarts. Stored as a small YAML file next to the rest of the
//! application's data, read once at construction and rewritten on every
//! change.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cloudshelf_core::ports::SyncStateStore;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct PersistedState {
    did_finish_initial_sync: bool,
}

/// YAML-file-backed implementation of [`SyncStateStore`].
pub struct YamlStateStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl YamlStateStore {
    /// Opens the store at `path`, tolerating a missing or unreadable
    /// file (which simply means no sync has ever completed).
    pub fn new(path: PathBuf) -> Self {
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_yaml::from_str(&content).ok())
            .unwrap_or_default();
        debug!(path = %path.display(), ?state, "opened sync state store");
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Platform-appropriate default path for the state file.
    ///
    /// Typically `$XDG_DATA_HOME/cloudshelf/sync-state.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("cloudshelf")
            .join("sync-state.yaml")
    }
}

impl SyncStateStore for YamlStateStore {
    fn did_finish_initial_sync(&self) -> bool {
        self.state.lock().unwrap().did_finish_initial_sync
    }

    fn set_did_finish_initial_sync(&self, done: bool) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.did_finish_initial_sync = done;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Err(err) = std::fs::write(&self.path, serde_yaml::to_string(&*state)?) {
            warn!(path = %self.path.display(), error = %err, "failed to persist sync state");
            return Err(err.into());
        }
        Ok(())
    }
}
