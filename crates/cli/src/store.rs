//! File-backed store for the CLI.
//!
//! The whole state (requests, transitions, stock, consumptions) lives in
//! one JSON snapshot file. Each command loads it into the in-memory
//! backends, runs, and writes the snapshot back on success.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dispatch_engine::{InventorySnapshot, MemoryInventory};
use dispatch_storage::{MemoryStore, StoreSnapshot};

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct FileState {
    #[serde(default)]
    pub store: StoreSnapshot,
    #[serde(default)]
    pub inventory: InventorySnapshot,
}

pub(crate) struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        FileStore { path }
    }

    /// Load the snapshot. A missing file is an empty state.
    pub(crate) fn load(&self) -> Result<FileState, String> {
        if !self.path.exists() {
            return Ok(FileState::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {}: {}", self.path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("cannot parse {}: {}", self.path.display(), e))
    }

    /// Write the current state of the backends back to the file.
    pub(crate) fn save(
        &self,
        store: &MemoryStore,
        inventory: &MemoryInventory,
    ) -> Result<(), String> {
        let state = FileState {
            store: store.snapshot(),
            inventory: inventory.snapshot(),
        };
        let raw = serde_json::to_string_pretty(&state)
            .map_err(|e| format!("cannot serialize store state: {}", e))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| format!("cannot write {}: {}", self.path.display(), e))
    }
}
