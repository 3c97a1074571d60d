//! The persisted state unit

use super::{DuplicateCache, SeenSet, WatermarkStore};
use serde::{Deserialize, Serialize};

/// Everything the engine persists between passes, as one document.
///
/// Watermarks, the seen set, and the duplicate cache must commit together:
/// persisting one without the others would let a watermark advance past
/// messages the dedup layers no longer remember. Serializing the trio as a
/// single JSON document makes the save a single atomic file replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSnapshot {
    pub watermarks: WatermarkStore,
    pub seen: SeenSet,
    pub duplicates: DuplicateCache,
}

impl SyncSnapshot {
    pub fn new() -> Self {
        Self::default()
    }
}
