//! Whole-pass coordination
//!
//! A pass is one scheduled invocation: load state, run every configured
//! folder, sweep the duplicate cache, persist, report.

use anyhow::{Context, Result};
use log::{info, warn};
use std::fmt;

use super::{DuplicateChecker, FolderJob, FolderStats, MailDestination, MailSource, sync_folder};
use crate::config::SyncSettings;
use crate::models::SyncFolder;
use crate::storage::StateStore;
use crate::sync::window::compute_threshold;

/// The three scheduled pass flavors
///
/// They share one algorithm and differ only in the window parameters and
/// ignore flags baked into [`PassConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Default window, respects watermark and seen set; runs frequently
    Fast,
    /// Larger window, ignores the watermark but still respects the seen
    /// set; runs at low frequency to catch source-side backfill
    Deep,
    /// Ignores both, capped item count, defaults to dry-run
    Test,
}

impl fmt::Display for PassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PassMode::Fast => "fast",
            PassMode::Deep => "deep",
            PassMode::Test => "test",
        })
    }
}

/// Per-invocation overrides accepted by the trigger interface
#[derive(Debug, Clone, Copy, Default)]
pub struct PassOverrides {
    pub limit: Option<usize>,
    pub dry_run: Option<bool>,
}

/// Immutable configuration for one pass, built once per invocation
///
/// Replaces the original's habit of threading ignore flags through long
/// parameter lists and temporarily mutating a shared age-window variable
/// for deep passes.
#[derive(Debug, Clone)]
pub struct PassConfig {
    pub mode: PassMode,
    pub folders: Vec<SyncFolder>,
    pub max_age_days: Option<u32>,
    pub grace_minutes: u32,
    pub ignore_watermark: bool,
    pub ignore_seen: bool,
    /// Import ceiling shared across the folder set; each folder gets the
    /// remaining budget
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub check_duplicates: bool,
    pub duplicate_max_age_days: u32,
    pub sent_label: String,
}

impl PassConfig {
    pub fn for_mode(mode: PassMode, settings: &SyncSettings, overrides: PassOverrides) -> Self {
        let base = Self {
            mode,
            folders: SyncFolder::ALL.to_vec(),
            max_age_days: Some(settings.import_last_days),
            grace_minutes: settings.grace_minutes,
            ignore_watermark: false,
            ignore_seen: false,
            limit: overrides.limit,
            dry_run: overrides.dry_run.unwrap_or(false),
            check_duplicates: settings.check_duplicates,
            duplicate_max_age_days: settings.duplicate_max_age_days,
            sent_label: settings.sent_label.clone(),
        };

        match mode {
            PassMode::Fast => base,
            PassMode::Deep => Self {
                max_age_days: Some(
                    settings
                        .deep_import_last_days
                        .unwrap_or(settings.import_last_days),
                ),
                ignore_watermark: true,
                ..base
            },
            PassMode::Test => Self {
                ignore_watermark: true,
                ignore_seen: true,
                limit: Some(overrides.limit.unwrap_or(settings.test_limit)),
                dry_run: overrides.dry_run.unwrap_or(settings.test_dry_run),
                ..base
            },
        }
    }
}

/// Aggregate statistics from one pass
#[derive(Debug, Clone)]
pub struct PassStats {
    pub mode: PassMode,
    pub dry_run: bool,
    /// Per-folder results, in execution order
    pub folders: Vec<(SyncFolder, FolderStats)>,
    /// Expired duplicate records removed by the sweep
    pub swept: usize,
    pub cache_size: usize,
    /// Duplicates whose message date falls in the trailing 7 days
    pub recent_duplicates: usize,
    pub seen_size: usize,
    pub duration_ms: u64,
}

impl PassStats {
    pub fn imported(&self) -> usize {
        self.folders.iter().map(|(_, s)| s.imported).sum()
    }

    pub fn duplicates_skipped(&self) -> usize {
        self.folders.iter().map(|(_, s)| s.duplicates_skipped).sum()
    }
}

/// Run one complete pass in the given configuration.
///
/// State is loaded once at the start and written back once at the end; a
/// failure anywhere in between leaves the persisted state untouched, and
/// re-running is safe because of the duplicate-suppression layers. A
/// connectivity failure against either remote aborts before any folder
/// runs. Dry-run passes persist nothing.
pub fn run_pass(
    config: &PassConfig,
    source: &dyn MailSource,
    destination: &dyn MailDestination,
    store: &dyn StateStore,
) -> Result<PassStats> {
    let start = std::time::Instant::now();
    info!("Starting {} pass{}", config.mode, if config.dry_run { " (dry-run)" } else { "" });

    let mut snapshot = store.load()?;

    source
        .verify()
        .context("Source mailbox (EWS) is unreachable")?;
    destination
        .verify()
        .context("Destination mail service (Gmail) is unreachable")?;

    let checker = DuplicateChecker::new(config.check_duplicates);
    let mut folder_stats = Vec::with_capacity(config.folders.len());
    let mut remaining = config.limit;

    for &folder in &config.folders {
        if remaining == Some(0) {
            info!("Import budget exhausted; skipping {}", folder);
            break;
        }

        let threshold = compute_threshold(
            snapshot.watermarks.get(folder),
            config.max_age_days,
            config.grace_minutes,
            config.ignore_watermark,
        );

        let job = FolderJob {
            folder,
            destination_labels: resolve_labels(folder, &config.sent_label, destination),
            ordering: folder.ordering(),
            threshold,
            limit: remaining,
            ignore_watermark: config.ignore_watermark,
            ignore_seen: config.ignore_seen,
            dry_run: config.dry_run,
        };

        let stats = sync_folder(&job, source, destination, &checker, &mut snapshot)?;
        info!(
            "{}: imported {}, skipped {} duplicate(s)",
            folder, stats.imported, stats.duplicates_skipped
        );

        if let Some(budget) = remaining {
            remaining = Some(budget.saturating_sub(stats.imported));
        }
        folder_stats.push((folder, stats));
    }

    let swept = snapshot.duplicates.sweep_expired(config.duplicate_max_age_days);
    if swept > 0 {
        info!("Swept {} expired duplicate record(s)", swept);
    }

    let stats = PassStats {
        mode: config.mode,
        dry_run: config.dry_run,
        folders: folder_stats,
        swept,
        cache_size: snapshot.duplicates.len(),
        recent_duplicates: snapshot.duplicates.recent_count(7),
        seen_size: snapshot.seen.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    if config.dry_run {
        info!("Dry-run pass: state not persisted");
    } else {
        store.save(&snapshot).context("Failed to persist sync state")?;
    }

    info!(
        "{} pass done in {}ms: {} imported, {} duplicate(s) skipped",
        config.mode,
        stats.duration_ms,
        stats.imported(),
        stats.duplicates_skipped()
    );
    Ok(stats)
}

/// Run a fast pass with the configured defaults
pub fn run_fast_pass(
    settings: &SyncSettings,
    overrides: PassOverrides,
    source: &dyn MailSource,
    destination: &dyn MailDestination,
    store: &dyn StateStore,
) -> Result<PassStats> {
    run_pass(
        &PassConfig::for_mode(PassMode::Fast, settings, overrides),
        source,
        destination,
        store,
    )
}

/// Run a deep pass (wide window, watermark ignored)
pub fn run_deep_pass(
    settings: &SyncSettings,
    overrides: PassOverrides,
    source: &dyn MailSource,
    destination: &dyn MailDestination,
    store: &dyn StateStore,
) -> Result<PassStats> {
    run_pass(
        &PassConfig::for_mode(PassMode::Deep, settings, overrides),
        source,
        destination,
        store,
    )
}

/// Run a test pass (capped, both ignore flags, dry-run by default)
pub fn run_test_pass(
    settings: &SyncSettings,
    overrides: PassOverrides,
    source: &dyn MailSource,
    destination: &dyn MailDestination,
    store: &dyn StateStore,
) -> Result<PassStats> {
    run_pass(
        &PassConfig::for_mode(PassMode::Test, settings, overrides),
        source,
        destination,
        store,
    )
}

fn resolve_labels(
    folder: SyncFolder,
    sent_label: &str,
    destination: &dyn MailDestination,
) -> Vec<String> {
    match folder {
        SyncFolder::Inbox => vec!["INBOX".to_string()],
        SyncFolder::Sent => match destination.ensure_label(sent_label) {
            Ok(id) => vec![id],
            Err(e) => {
                // Built-in SENT keeps the mail grouped even when label
                // creation is unavailable
                warn!(
                    "Could not resolve label '{}': {:#}; falling back to SENT",
                    sent_label, e
                );
                vec!["SENT".to_string()]
            }
        },
    }
}
