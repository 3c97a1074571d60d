//! In-memory snapshot storage

use anyhow::Result;
use std::sync::RwLock;

use super::StateStore;
use crate::models::SyncSnapshot;

/// In-memory implementation of StateStore
///
/// Used by tests and tooling that should not touch the filesystem.
pub struct MemoryStateStore {
    snapshot: RwLock<SyncSnapshot>,
}

impl MemoryStateStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(SyncSnapshot::new()),
        }
    }

    /// Create a store seeded with an existing snapshot
    pub fn with_snapshot(snapshot: SyncSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<SyncSnapshot> {
        Ok(self.snapshot.read().unwrap().clone())
    }

    fn save(&self, snapshot: &SyncSnapshot) -> Result<()> {
        *self.snapshot.write().unwrap() = snapshot.clone();
        Ok(())
    }
}
