//! Per-folder watermark tracking

use super::SyncFolder;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Newest successfully processed message timestamp, per folder
///
/// A folder with no entry has never completed a pass. Values only move
/// forward; a stored value from the future (clock skew, hand-edited state)
/// is clamped rather than trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatermarkStore {
    folders: HashMap<String, DateTime<Utc>>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current watermark for a folder, clamped against wall-clock time.
    ///
    /// A stored value later than now is pulled back to one minute before now
    /// and logged; it is never an error.
    pub fn get(&self, folder: SyncFolder) -> Option<DateTime<Utc>> {
        let stored = self.folders.get(folder.key()).copied()?;
        let now = Utc::now();
        if stored > now {
            warn!(
                "Watermark for {} is in the future ({}); clamping to {} minus one minute",
                folder, stored, now
            );
            return Some(now - Duration::minutes(1));
        }
        Some(stored)
    }

    /// Propose a new watermark for a folder.
    ///
    /// A proposal from the future is clamped to now. A proposal older than
    /// the stored value is ignored so the watermark never regresses. A stored
    /// value from the future is replaced outright, so a pass repairs bad
    /// persisted state instead of carrying it forward.
    pub fn propose(&mut self, folder: SyncFolder, candidate: DateTime<Utc>) {
        let now = Utc::now();
        let candidate = if candidate > now {
            warn!(
                "Proposed watermark for {} is in the future ({}); clamping to now",
                folder, candidate
            );
            now
        } else {
            candidate
        };

        let entry = self.folders.entry(folder.key().to_string()).or_insert(candidate);
        if *entry > now {
            warn!(
                "Stored watermark for {} is in the future ({}); overwriting with {}",
                folder, entry, candidate
            );
            *entry = candidate;
        } else if candidate > *entry {
            *entry = candidate;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Iterate stored (folder key, watermark) pairs, for status reporting
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DateTime<Utc>)> {
        self.folders.iter()
    }
}
