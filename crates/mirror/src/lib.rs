//! Mirror crate - One-way Exchange to Gmail mail synchronization
//!
//! This crate provides:
//! - Domain models (MessageCandidate, watermarks, seen set, duplicate cache)
//! - The incremental sync engine (window planning, dedup, folder passes)
//! - EWS source adapter and Gmail destination adapter
//! - Snapshot persistence between scheduled passes
//!
//! The engine runs as a short batch job: one invocation is one pass, with
//! no parallelism and no state shared outside the persisted snapshot.

pub mod config;
pub mod ews;
pub mod gmail;
pub mod models;
pub mod storage;
pub mod sync;

pub use config::{EwsCredentials, GmailCredentials, SyncSettings};
pub use ews::{EwsClient, EwsResponseError, FolderInfo};
pub use gmail::{GmailAuth, GmailClient};
pub use models::{
    DuplicateCache, DuplicateRecord, EmailAddress, MessageCandidate, MessageId, OrderingField,
    SeenSet, SyncFolder, SyncSnapshot, WatermarkStore,
};
pub use storage::{FileStateStore, MemoryStateStore, StateStore};
pub use sync::{
    DuplicateChecker, FolderJob, FolderStats, MailDestination, MailSource, PassConfig, PassMode,
    PassOverrides, PassStats, run_deep_pass, run_fast_pass, run_pass, run_test_pass, sync_folder,
};
