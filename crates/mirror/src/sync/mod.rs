//! The incremental sync engine
//!
//! One pass runs sequentially over the configured folders; per-folder
//! ordering by ascending timestamp is what makes watermark advancement
//! correct, so nothing here is parallel.

mod dedup;
mod folder;
mod pass;
mod traits;
pub mod window;

pub use dedup::DuplicateChecker;
pub use folder::{CandidateOutcome, FolderJob, FolderStats, sync_folder};
pub use pass::{
    PassConfig, PassMode, PassOverrides, PassStats, run_deep_pass, run_fast_pass, run_pass,
    run_test_pass,
};
pub use traits::{MailDestination, MailSource};
