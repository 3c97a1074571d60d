//! Domain models for the sync engine

mod duplicates;
mod folder;
mod message;
mod seen;
mod snapshot;
mod watermarks;

pub use duplicates::{DuplicateCache, DuplicateRecord};
pub use folder::{OrderingField, SyncFolder};
pub use message::{EmailAddress, MessageCandidate, MessageCandidateBuilder, MessageId};
pub use seen::SeenSet;
pub use snapshot::SyncSnapshot;
pub use watermarks::WatermarkStore;
