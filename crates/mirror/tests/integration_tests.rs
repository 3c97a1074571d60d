//! Integration tests for the mirror crate
//!
//! These drive complete passes through scripted source/destination fakes
//! and verify the engine's idempotency, watermark, and duplicate-handling
//! guarantees end to end.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use mirror::{
    run_deep_pass, run_fast_pass, run_test_pass, FileStateStore, MailDestination, MailSource,
    MemoryStateStore, MessageCandidate, MessageId, OrderingField, PassOverrides, StateStore,
    SyncFolder, SyncSettings, SyncSnapshot,
};
use tempfile::TempDir;

/// Source fake backed by per-folder candidate lists; honors threshold,
/// ordering, and limit the way the EWS adapter does server-side.
struct FakeSource {
    folders: Mutex<HashMap<SyncFolder, Vec<MessageCandidate>>>,
    unreachable: bool,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            folders: Mutex::new(HashMap::new()),
            unreachable: false,
        }
    }

    fn unreachable() -> Self {
        Self {
            folders: Mutex::new(HashMap::new()),
            unreachable: true,
        }
    }

    fn add(&self, folder: SyncFolder, candidate: MessageCandidate) {
        self.folders
            .lock()
            .unwrap()
            .entry(folder)
            .or_default()
            .push(candidate);
    }
}

impl MailSource for FakeSource {
    fn list(
        &self,
        folder: SyncFolder,
        ordering: OrderingField,
        newer_than: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageCandidate>> {
        let folders = self.folders.lock().unwrap();
        let mut out: Vec<MessageCandidate> = folders
            .get(&folder)
            .map(|c| c.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|c| match (newer_than, c.timestamp(ordering)) {
                (Some(bound), Some(ts)) => ts > bound,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        out.sort_by_key(|c| c.timestamp(ordering));
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn verify(&self) -> Result<()> {
        if self.unreachable {
            bail!("connection refused");
        }
        Ok(())
    }
}

/// Destination fake that records imports and answers existence queries
/// from a scripted set plus everything imported so far.
struct FakeDestination {
    imported: Mutex<Vec<(Option<String>, Vec<String>)>>,
    existing: Mutex<HashSet<String>>,
    exist_queries: Mutex<Vec<String>>,
}

impl FakeDestination {
    fn new() -> Self {
        Self {
            imported: Mutex::new(Vec::new()),
            existing: Mutex::new(HashSet::new()),
            exist_queries: Mutex::new(Vec::new()),
        }
    }

    fn with_existing(ids: &[&str]) -> Self {
        let destination = Self::new();
        *destination.existing.lock().unwrap() =
            ids.iter().map(|s| s.to_string()).collect();
        destination
    }

    fn import_count(&self) -> usize {
        self.imported.lock().unwrap().len()
    }

    fn exist_query_count(&self) -> usize {
        self.exist_queries.lock().unwrap().len()
    }
}

impl MailDestination for FakeDestination {
    fn import(&self, raw: &[u8], label_ids: &[String]) -> Result<String> {
        // Pull the Message-ID back out of the raw bytes so existence
        // queries see messages imported earlier in the pass
        let body = String::from_utf8_lossy(raw);
        let mid = body
            .lines()
            .find_map(|l| l.strip_prefix("Message-ID: "))
            .map(|s| s.to_string());
        if let Some(mid) = &mid {
            self.existing.lock().unwrap().insert(mid.clone());
        }
        let mut imported = self.imported.lock().unwrap();
        imported.push((mid, label_ids.to_vec()));
        Ok(format!("g{}", imported.len()))
    }

    fn message_exists(&self, id: &MessageId) -> Result<bool> {
        self.exist_queries
            .lock()
            .unwrap()
            .push(id.as_str().to_string());
        Ok(self.existing.lock().unwrap().contains(id.as_str()))
    }

    fn ensure_label(&self, _name: &str) -> Result<String> {
        Ok("Label_7".to_string())
    }

    fn verify(&self) -> Result<()> {
        Ok(())
    }
}

fn inbox_candidate(id: &str, subject: &str, hours_ago: i64) -> MessageCandidate {
    MessageCandidate {
        identifier: Some(MessageId::from(id)),
        raw: format!("Message-ID: {}\r\nSubject: {}\r\n\r\nbody", id, subject).into_bytes(),
        subject: subject.to_string(),
        sender: None,
        received_at: Some(Utc::now() - Duration::hours(hours_ago)),
        sent_at: Some(Utc::now() - Duration::hours(hours_ago) - Duration::minutes(1)),
    }
}

fn sent_candidate(id: &str, subject: &str, hours_ago: i64) -> MessageCandidate {
    MessageCandidate {
        sent_at: Some(Utc::now() - Duration::hours(hours_ago)),
        ..inbox_candidate(id, subject, hours_ago)
    }
}

fn settings() -> SyncSettings {
    SyncSettings {
        import_last_days: 2,
        deep_import_last_days: Some(14),
        grace_minutes: 180,
        duplicate_max_age_days: 30,
        check_duplicates: true,
        sent_label: "Exchange/Sent".to_string(),
        test_limit: 5,
        test_dry_run: true,
    }
}

#[test]
fn test_fast_pass_imports_and_is_idempotent() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "one", 5));
    source.add(SyncFolder::Inbox, inbox_candidate("<b@x>", "two", 3));
    source.add(SyncFolder::Sent, sent_candidate("<c@x>", "outgoing", 4));
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    let first = run_fast_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap();
    assert_eq!(first.imported(), 3);
    assert_eq!(first.duplicates_skipped(), 0);
    assert_eq!(destination.import_count(), 3);

    // Second pass with no new source messages imports nothing more
    let second = run_fast_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap();
    assert_eq!(second.imported(), 0);
    assert_eq!(second.duplicates_skipped(), 0);
    assert_eq!(destination.import_count(), 3);
}

#[test]
fn test_watermark_advances_monotonically_and_never_into_future() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "one", 6));
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    run_fast_pass(&settings(), PassOverrides::default(), &source, &destination, &store).unwrap();
    let after_first = store.load().unwrap().watermarks.get(SyncFolder::Inbox).unwrap();

    source.add(SyncFolder::Inbox, inbox_candidate("<b@x>", "two", 1));
    run_fast_pass(&settings(), PassOverrides::default(), &source, &destination, &store).unwrap();
    let after_second = store.load().unwrap().watermarks.get(SyncFolder::Inbox).unwrap();

    assert!(after_second >= after_first);
    assert!(after_second <= Utc::now());
}

#[test]
fn test_pass_repairs_future_watermark_in_persisted_state() {
    // Hand-edited or clock-skewed state: the stored inbox watermark is a day
    // ahead. After a successful pass the persisted value, not just the
    // clamped read, must be back at or before wall-clock time.
    let future = Utc::now() + Duration::days(1);
    let json = format!("{{\"watermarks\":{{\"inbox\":\"{}\"}}}}", future.to_rfc3339());
    let snapshot: SyncSnapshot = serde_json::from_str(&json).unwrap();
    let store = MemoryStateStore::with_snapshot(snapshot);

    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "fresh", 1));
    let destination = FakeDestination::new();

    run_fast_pass(&settings(), PassOverrides::default(), &source, &destination, &store).unwrap();

    let saved = store.load().unwrap();
    let now = Utc::now();
    for (key, stored) in saved.watermarks.iter() {
        assert!(
            *stored <= now,
            "persisted watermark for {} is in the future: {}",
            key,
            stored
        );
    }
}

#[test]
fn test_remote_duplicate_is_skipped_and_recorded() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<dup@x>", "already there", 4));
    source.add(SyncFolder::Inbox, inbox_candidate("<new@x>", "fresh", 2));
    let destination = FakeDestination::with_existing(&["<dup@x>"]);
    let store = MemoryStateStore::new();

    let stats = run_fast_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap();

    assert_eq!(stats.imported(), 1);
    assert_eq!(stats.duplicates_skipped(), 1);
    assert_eq!(destination.import_count(), 1);

    let snapshot = store.load().unwrap();
    let record = snapshot
        .duplicates
        .lookup(&MessageId::from("<dup@x>"))
        .unwrap();
    assert_eq!(record.subject, "already there");
    assert!(snapshot.seen.contains(&MessageId::from("<new@x>")));
    assert!(!snapshot.seen.contains(&MessageId::from("<dup@x>")));
}

#[test]
fn test_seen_identifiers_skip_without_remote_queries() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "one", 5));
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    run_fast_pass(&settings(), PassOverrides::default(), &source, &destination, &store).unwrap();
    let queries_after_first = destination.exist_query_count();

    // Deep pass re-lists everything (watermark ignored) but the seen set
    // still suppresses both the import and the remote lookup
    let deep = run_deep_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap();

    assert_eq!(deep.imported(), 0);
    assert_eq!(deep.duplicates_skipped(), 0);
    assert_eq!(destination.exist_query_count(), queries_after_first);
}

#[test]
fn test_test_mode_budget_is_shared_across_folders() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "one", 6));
    source.add(SyncFolder::Inbox, inbox_candidate("<b@x>", "two", 5));
    source.add(SyncFolder::Sent, sent_candidate("<c@x>", "three", 4));
    source.add(SyncFolder::Sent, sent_candidate("<d@x>", "four", 3));
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    let overrides = PassOverrides {
        limit: Some(3),
        dry_run: Some(false),
    };
    let stats = run_test_pass(&settings(), overrides, &source, &destination, &store).unwrap();

    // 2 from inbox exhaust most of the budget; sent gets the remaining 1
    assert_eq!(stats.imported(), 3);
    assert_eq!(destination.import_count(), 3);
    let per_folder: Vec<usize> = stats.folders.iter().map(|(_, s)| s.imported).collect();
    assert_eq!(per_folder, vec![2, 1]);
}

#[test]
fn test_test_mode_defaults_to_dry_run_and_persists_nothing() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "one", 5));
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    let stats = run_test_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap();

    assert!(stats.dry_run);
    assert_eq!(stats.imported(), 1);
    assert_eq!(destination.import_count(), 0);

    let snapshot = store.load().unwrap();
    assert!(snapshot.watermarks.is_empty());
    assert!(snapshot.seen.is_empty());
}

#[test]
fn test_unreachable_source_aborts_without_persisting() {
    let source = FakeSource::unreachable();
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    let err = run_fast_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap_err();

    assert!(err.to_string().contains("EWS"));
    assert!(store.load().unwrap().watermarks.is_empty());
}

#[test]
fn test_sent_folder_uses_resolved_label() {
    let source = FakeSource::new();
    source.add(SyncFolder::Sent, sent_candidate("<c@x>", "outgoing", 4));
    let destination = FakeDestination::new();
    let store = MemoryStateStore::new();

    run_fast_pass(&settings(), PassOverrides::default(), &source, &destination, &store).unwrap();

    let imported = destination.imported.lock().unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].1, vec!["Label_7".to_string()]);
}

#[test]
fn test_state_survives_process_restart_via_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<a@x>", "one", 5));
    let destination = FakeDestination::new();

    {
        let store = FileStateStore::new(&path).unwrap();
        let stats = run_fast_pass(
            &settings(),
            PassOverrides::default(),
            &source,
            &destination,
            &store,
        )
        .unwrap();
        assert_eq!(stats.imported(), 1);
    }

    // A fresh store over the same file sees the committed state, so the
    // re-listed message is treated as already processed
    let store = FileStateStore::new(&path).unwrap();
    let snapshot = store.load().unwrap();
    assert!(snapshot.seen.contains(&MessageId::from("<a@x>")));

    let destination2 = FakeDestination::new();
    let stats = run_fast_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination2,
        &store,
    )
    .unwrap();
    assert_eq!(stats.imported(), 0);
    assert_eq!(destination2.import_count(), 0);
}

#[test]
fn test_pass_reports_cache_statistics() {
    let source = FakeSource::new();
    source.add(SyncFolder::Inbox, inbox_candidate("<dup@x>", "seen before", 4));
    let destination = FakeDestination::with_existing(&["<dup@x>"]);
    let store = MemoryStateStore::new();

    let stats = run_fast_pass(
        &settings(),
        PassOverrides::default(),
        &source,
        &destination,
        &store,
    )
    .unwrap();

    assert_eq!(stats.cache_size, 1);
    assert_eq!(stats.recent_duplicates, 1);
    assert_eq!(stats.swept, 0);
    assert_eq!(stats.seen_size, 0);
}
