//! Query window planning
//!
//! Pure functions that can be tested without adapters.

use chrono::{DateTime, Duration, Utc};

/// Compute the lower bound for a folder pass; candidates must be strictly
/// newer than the returned timestamp.
///
/// Two independent bounds apply and the later one wins:
/// * age cutoff: `now - max_age_days`, bounding worst-case backlog;
/// * watermark bound: `watermark - grace_minutes`, re-examining a trailing
///   window before the last watermark to tolerate out-of-order delivery.
///
/// With `ignore_watermark` (backfill/test passes) only the age cutoff
/// applies. `None` means no filtering at all: an unbounded historical scan,
/// sensible only under a test-mode item ceiling.
pub fn compute_threshold(
    watermark: Option<DateTime<Utc>>,
    max_age_days: Option<u32>,
    grace_minutes: u32,
    ignore_watermark: bool,
) -> Option<DateTime<Utc>> {
    let now = Utc::now();

    let age_cutoff = max_age_days.map(|days| now - Duration::days(i64::from(days)));
    let watermark_bound = if ignore_watermark {
        None
    } else {
        watermark.map(|w| w - Duration::minutes(i64::from(grace_minutes)))
    };

    match (age_cutoff, watermark_bound) {
        (Some(age), Some(mark)) => Some(age.max(mark)),
        (Some(age), None) => Some(age),
        (None, Some(mark)) => Some(mark),
        (None, None) => None,
    }
}
