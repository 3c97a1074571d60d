//! Storage trait definitions

use crate::models::SyncSnapshot;
use anyhow::Result;

/// Trait for persisting sync state between passes
///
/// A pass loads the snapshot once at start and saves it once at the end; the
/// save must be all-or-nothing so the watermarks can never outrun the dedup
/// state they were computed against.
pub trait StateStore: Send + Sync {
    /// Load the persisted snapshot, or a default one if none exists
    fn load(&self) -> Result<SyncSnapshot>;

    /// Replace the persisted snapshot atomically
    fn save(&self, snapshot: &SyncSnapshot) -> Result<()>;
}
