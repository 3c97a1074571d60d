//! Two-tier duplicate detection

use chrono::Utc;
use log::{info, warn};

use super::MailDestination;
use crate::models::{DuplicateCache, DuplicateRecord, MessageCandidate, SeenSet};

/// Decides whether a candidate already exists at the destination.
///
/// The check is layered: the seen set answers without a network call, then
/// a remote search by Message-ID header. Every inconclusive path fails open
/// (returns "not a duplicate") because a missed duplicate is merely a
/// visible double message, while a wrongly skipped message is unrecoverable
/// under one-way sync.
pub struct DuplicateChecker {
    enabled: bool,
}

impl DuplicateChecker {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_duplicate(
        &self,
        candidate: &MessageCandidate,
        seen: &SeenSet,
        cache: &mut DuplicateCache,
        destination: &dyn MailDestination,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let Some(id) = &candidate.identifier else {
            // No Message-ID header: duplicate status cannot be established
            return false;
        };

        if seen.contains(id) {
            return true;
        }

        match destination.message_exists(id) {
            Ok(true) => {
                info!("Destination already has {}; recording duplicate", id.as_str());
                cache.insert(DuplicateRecord {
                    identifier: id.as_str().to_string(),
                    subject: candidate.subject.clone(),
                    sender: candidate
                        .sender
                        .as_ref()
                        .map(|s| s.display())
                        .unwrap_or_default(),
                    observed_at: candidate.observed_at(),
                    detected_at: Utc::now(),
                });
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Duplicate check failed for {}: {:#}", id.as_str(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use anyhow::{Result, bail};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDestination {
        exists: bool,
        fail: bool,
        exist_calls: AtomicUsize,
    }

    impl FakeDestination {
        fn reporting(exists: bool) -> Self {
            Self {
                exists,
                fail: false,
                exist_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                exists: false,
                fail: true,
                exist_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.exist_calls.load(Ordering::SeqCst)
        }
    }

    impl MailDestination for FakeDestination {
        fn import(&self, _raw: &[u8], _label_ids: &[String]) -> Result<String> {
            Ok("g1".to_string())
        }

        fn message_exists(&self, _id: &MessageId) -> Result<bool> {
            self.exist_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("search unavailable");
            }
            Ok(self.exists)
        }

        fn ensure_label(&self, name: &str) -> Result<String> {
            Ok(name.to_string())
        }

        fn verify(&self) -> Result<()> {
            Ok(())
        }
    }

    fn candidate(id: Option<&str>) -> MessageCandidate {
        let mut builder = MessageCandidate::builder()
            .subject("Quarterly numbers")
            .received_at(Utc::now() - Duration::hours(1));
        if let Some(id) = id {
            builder = builder.identifier(id);
        }
        builder.build()
    }

    #[test]
    fn test_disabled_checker_passes_everything_through() {
        let checker = DuplicateChecker::new(false);
        let destination = FakeDestination::reporting(true);
        let mut cache = DuplicateCache::new();
        let seen = SeenSet::new();

        assert!(!checker.is_duplicate(&candidate(Some("<a@x>")), &seen, &mut cache, &destination));
        assert_eq!(destination.calls(), 0);
    }

    #[test]
    fn test_missing_identifier_is_never_a_duplicate() {
        let checker = DuplicateChecker::new(true);
        let destination = FakeDestination::reporting(true);
        let mut cache = DuplicateCache::new();
        let mut seen = SeenSet::new();
        seen.insert(&MessageId::from("<other@x>"));

        assert!(!checker.is_duplicate(&candidate(None), &seen, &mut cache, &destination));
        assert_eq!(destination.calls(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_seen_identifier_short_circuits_without_remote_call() {
        let checker = DuplicateChecker::new(true);
        let destination = FakeDestination::reporting(false);
        let mut cache = DuplicateCache::new();
        let mut seen = SeenSet::new();
        seen.insert(&MessageId::from("<a@x>"));

        assert!(checker.is_duplicate(&candidate(Some("<a@x>")), &seen, &mut cache, &destination));
        assert_eq!(destination.calls(), 0);
    }

    #[test]
    fn test_remote_match_records_and_skips() {
        let checker = DuplicateChecker::new(true);
        let destination = FakeDestination::reporting(true);
        let mut cache = DuplicateCache::new();
        let seen = SeenSet::new();

        assert!(checker.is_duplicate(&candidate(Some("<a@x>")), &seen, &mut cache, &destination));
        assert_eq!(destination.calls(), 1);

        let record = cache.lookup(&MessageId::from("<a@x>")).unwrap();
        assert_eq!(record.subject, "Quarterly numbers");
        assert!(record.observed_at.is_some());
    }

    #[test]
    fn test_remote_miss_is_not_a_duplicate() {
        let checker = DuplicateChecker::new(true);
        let destination = FakeDestination::reporting(false);
        let mut cache = DuplicateCache::new();
        let seen = SeenSet::new();

        assert!(!checker.is_duplicate(&candidate(Some("<a@x>")), &seen, &mut cache, &destination));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remote_error_fails_open() {
        let checker = DuplicateChecker::new(true);
        let destination = FakeDestination::failing();
        let mut cache = DuplicateCache::new();
        let seen = SeenSet::new();

        assert!(!checker.is_duplicate(&candidate(Some("<a@x>")), &seen, &mut cache, &destination));
        assert_eq!(destination.calls(), 1);
        assert!(cache.is_empty());
    }
}
