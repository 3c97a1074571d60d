//! Snapshot persistence
//!
//! The trait-based design allows swapping the file-backed store for an
//! in-memory one in tests.

mod file;
mod memory;
mod traits;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use traits::StateStore;
