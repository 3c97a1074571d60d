//! Single-folder pass execution

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info};

use super::{DuplicateChecker, MailDestination, MailSource};
use crate::models::{MessageCandidate, OrderingField, SyncFolder, SyncSnapshot};

/// Everything one folder pass needs, assembled once by the coordinator
#[derive(Debug, Clone)]
pub struct FolderJob {
    pub folder: SyncFolder,
    /// Destination label ids applied to every imported message
    pub destination_labels: Vec<String>,
    pub ordering: OrderingField,
    /// Exclusive lower bound for candidate timestamps; None scans unbounded
    pub threshold: Option<DateTime<Utc>>,
    /// Stop once this many messages have been imported
    pub limit: Option<usize>,
    pub ignore_watermark: bool,
    pub ignore_seen: bool,
    pub dry_run: bool,
}

/// Counters from one folder pass
#[derive(Debug, Default, Clone)]
pub struct FolderStats {
    pub imported: usize,
    pub duplicates_skipped: usize,
    /// Newest ordering timestamp observed, the watermark proposal
    pub newest: Option<DateTime<Utc>>,
}

/// What happened to a single candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Imported,
    SkippedSeen,
    SkippedDuplicate,
    ImportFailed,
}

/// Run one folder pass: list candidates, filter, import, track the newest
/// observed timestamp, and propose the watermark.
///
/// The candidate loop is a plain state machine over [`CandidateOutcome`];
/// a failed import is a per-candidate no-op, never a pass abort. The newest
/// tracker starts from the folder's current watermark (when respected) so a
/// pass with nothing new re-proposes the same value, and is not advanced by
/// failed imports so the grace window can pick those messages up again.
pub fn sync_folder(
    job: &FolderJob,
    source: &dyn MailSource,
    destination: &dyn MailDestination,
    checker: &DuplicateChecker,
    snapshot: &mut SyncSnapshot,
) -> Result<FolderStats> {
    let mut stats = FolderStats::default();
    let mut newest = if job.ignore_watermark {
        None
    } else {
        snapshot.watermarks.get(job.folder)
    };

    let candidates = source.list(job.folder, job.ordering, job.threshold, job.limit)?;
    info!("{}: {} candidate(s) to consider", job.folder, candidates.len());

    for candidate in &candidates {
        let outcome = process_candidate(candidate, job, destination, checker, snapshot);

        match outcome {
            CandidateOutcome::SkippedSeen => {}
            CandidateOutcome::SkippedDuplicate => stats.duplicates_skipped += 1,
            CandidateOutcome::Imported => stats.imported += 1,
            CandidateOutcome::ImportFailed => continue,
        }

        if let Some(ts) = candidate.timestamp(job.ordering) {
            newest = Some(newest.map_or(ts, |n| n.max(ts)));
        }

        if let Some(limit) = job.limit
            && stats.imported >= limit
        {
            info!("{}: import limit {} reached; stopping early", job.folder, limit);
            break;
        }
    }

    if !job.ignore_watermark
        && !job.dry_run
        && let Some(ts) = newest
    {
        snapshot.watermarks.propose(job.folder, ts);
    }

    stats.newest = newest;
    Ok(stats)
}

fn process_candidate(
    candidate: &MessageCandidate,
    job: &FolderJob,
    destination: &dyn MailDestination,
    checker: &DuplicateChecker,
    snapshot: &mut SyncSnapshot,
) -> CandidateOutcome {
    if !job.ignore_seen
        && let Some(id) = &candidate.identifier
        && snapshot.seen.contains(id)
    {
        return CandidateOutcome::SkippedSeen;
    }

    if checker.is_duplicate(candidate, &snapshot.seen, &mut snapshot.duplicates, destination) {
        return CandidateOutcome::SkippedDuplicate;
    }

    if !job.dry_run {
        if let Err(e) = destination.import(&candidate.raw, &job.destination_labels) {
            error!(
                "{}: failed to import {}: {:#}",
                job.folder,
                describe(candidate),
                e
            );
            return CandidateOutcome::ImportFailed;
        }
        if let Some(id) = &candidate.identifier {
            snapshot.seen.insert(id);
        }
    }

    CandidateOutcome::Imported
}

fn describe(candidate: &MessageCandidate) -> &str {
    match &candidate.identifier {
        Some(id) => id.as_str(),
        None => "(no Message-ID)",
    }
}
