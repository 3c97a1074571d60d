//! Aging cache of confirmed remote duplicates

use super::MessageId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One confirmed duplicate: a source message whose Message-ID already
/// existed at the destination when the detector checked.
///
/// Records are audit data, not skip authority. They are immutable once
/// created and removed only by the expiry sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub identifier: String,
    pub subject: String,
    pub sender: String,
    /// The message's own received-or-sent time
    pub observed_at: Option<DateTime<Utc>>,
    /// Wall-clock time the duplicate was confirmed; drives expiry
    pub detected_at: DateTime<Utc>,
}

/// Bounded-lifetime map from Message-ID to its duplicate record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuplicateCache {
    records: HashMap<String, DuplicateRecord>,
}

impl DuplicateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: &MessageId) -> Option<&DuplicateRecord> {
        self.records.get(id.as_str())
    }

    pub fn insert(&mut self, record: DuplicateRecord) {
        self.records.insert(record.identifier.clone(), record);
    }

    /// Remove records older than `max_age_days`, returning how many were
    /// removed. Runs once per pass.
    pub fn sweep_expired(&mut self, max_age_days: u32) -> usize {
        let cutoff = Utc::now() - Duration::days(i64::from(max_age_days));
        let before = self.records.len();
        self.records.retain(|_, record| record.detected_at >= cutoff);
        before - self.records.len()
    }

    /// How many records observed a message within the trailing `days`
    pub fn recent_count(&self, days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(days);
        self.records
            .values()
            .filter(|record| record.observed_at.is_some_and(|at| at >= cutoff))
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_detected(days_ago: i64) -> DuplicateRecord {
        DuplicateRecord {
            identifier: format!("<dup-{}@example.com>", days_ago),
            subject: "Weekly report".to_string(),
            sender: "Alice <alice@example.com>".to_string(),
            observed_at: Some(Utc::now() - Duration::days(days_ago)),
            detected_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut cache = DuplicateCache::new();
        let record = record_detected(0);
        let id = MessageId::from(record.identifier.as_str());
        cache.insert(record.clone());

        assert_eq!(cache.lookup(&id), Some(&record));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_stale_records() {
        let mut cache = DuplicateCache::new();
        cache.insert(record_detected(31));
        cache.insert(record_detected(29));

        let removed = cache.sweep_expired(30);

        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&MessageId::from("<dup-29@example.com>")).is_some());
        assert!(cache.lookup(&MessageId::from("<dup-31@example.com>")).is_none());
    }

    #[test]
    fn test_sweep_on_empty_cache_removes_nothing() {
        let mut cache = DuplicateCache::new();
        assert_eq!(cache.sweep_expired(30), 0);
    }

    #[test]
    fn test_recent_count_uses_observed_date() {
        let mut cache = DuplicateCache::new();
        cache.insert(record_detected(2));
        cache.insert(record_detected(10));
        cache.insert(DuplicateRecord {
            observed_at: None,
            ..record_detected(0)
        });

        assert_eq!(cache.recent_count(7), 1);
    }
}
