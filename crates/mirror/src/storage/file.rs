//! File-based snapshot storage

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use super::StateStore;
use crate::models::SyncSnapshot;

/// Snapshot storage backed by a single JSON file
///
/// The whole snapshot lives in one document so a save is one atomic file
/// replace. Loading is lenient: a missing or unreadable file yields a fresh
/// default snapshot with a warning, never an error, so a corrupted state
/// file degrades to a full re-scan instead of blocking every future pass.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store at the given file path, creating parent directories
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<SyncSnapshot> {
        if !self.path.exists() {
            return Ok(SyncSnapshot::new());
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not read state file {}: {}; starting from empty state",
                    self.path.display(),
                    e
                );
                return Ok(SyncSnapshot::new());
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(
                    "State file {} is not valid JSON ({}); starting from empty state",
                    self.path.display(),
                    e
                );
                Ok(SyncSnapshot::new())
            }
        }
    }

    fn save(&self, snapshot: &SyncSnapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;

        // Write atomically (write to temp, then rename)
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write state file: {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, SyncFolder};
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json")).unwrap();

        let snapshot = store.load().unwrap();
        assert!(snapshot.watermarks.is_empty());
        assert!(snapshot.seen.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json")).unwrap();

        let mut snapshot = SyncSnapshot::new();
        snapshot.watermarks.propose(SyncFolder::Inbox, Utc::now());
        snapshot.seen.insert(&MessageId::from("<a@example.com>"));
        store.save(&snapshot).unwrap();

        let restored = store.load().unwrap();
        assert_eq!(snapshot, restored);
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStateStore::new(&path).unwrap();
        let snapshot = store.load().unwrap();
        assert!(snapshot.seen.is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json")).unwrap();
        store.save(&SyncSnapshot::new()).unwrap();

        assert!(dir.path().join("state.json").exists());
        assert!(!dir.path().join("state.tmp").exists());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("state.json");
        let store = FileStateStore::new(&nested).unwrap();
        store.save(&SyncSnapshot::new()).unwrap();
        assert!(nested.exists());
    }
}
