//! Subcommand implementations
//!
//! Each command builds the adapters it needs from the environment and the
//! Ferry config directory, runs, and prints a human-readable report.

use anyhow::{Context, Result};
use log::warn;

use mirror::{
    EwsClient, EwsCredentials, FileStateStore, GmailAuth, GmailClient, GmailCredentials,
    PassOverrides, PassStats, StateStore, SyncSettings, run_deep_pass, run_fast_pass,
    run_test_pass,
};

use crate::cli::Commands;

pub fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Fast { limit, dry_run } => {
            let overrides = PassOverrides {
                limit,
                dry_run: dry_run.then_some(true),
            };
            run_and_report(|settings, source, destination, store| {
                run_fast_pass(settings, overrides, source, destination, store)
            })
        }
        Commands::Deep { limit, dry_run } => {
            let overrides = PassOverrides {
                limit,
                dry_run: dry_run.then_some(true),
            };
            run_and_report(|settings, source, destination, store| {
                run_deep_pass(settings, overrides, source, destination, store)
            })
        }
        Commands::Test { limit, import } => {
            let overrides = PassOverrides {
                limit,
                dry_run: import.then_some(false),
            };
            run_and_report(|settings, source, destination, store| {
                run_test_pass(settings, overrides, source, destination, store)
            })
        }
        Commands::Auth { logout } => auth(logout),
        Commands::Folders => folders(),
        Commands::Status => status(),
    }
}

fn run_and_report<F>(pass: F) -> Result<()>
where
    F: FnOnce(&SyncSettings, &EwsClient, &GmailClient, &FileStateStore) -> Result<PassStats>,
{
    let settings = SyncSettings::from_env();
    let source = ews_client()?;
    let destination = gmail_client()?;
    let store = state_store()?;

    let stats = pass(&settings, &source, &destination, &store)?;
    report(&stats);
    Ok(())
}

fn report(stats: &PassStats) {
    let suffix = if stats.dry_run { " (dry-run)" } else { "" };
    println!("{} pass{} finished in {}ms", stats.mode, suffix, stats.duration_ms);
    for (folder, folder_stats) in &stats.folders {
        println!(
            "  {}: {} imported, {} duplicate(s) skipped",
            folder, folder_stats.imported, folder_stats.duplicates_skipped
        );
    }
    println!(
        "  total: {} imported, {} duplicate(s) skipped",
        stats.imported(),
        stats.duplicates_skipped()
    );
    println!(
        "  dedup: {} identifier(s) seen, {} cached duplicate(s) ({} recent, {} swept)",
        stats.seen_size, stats.cache_size, stats.recent_duplicates, stats.swept
    );
}

fn auth(logout: bool) -> Result<()> {
    let auth = gmail_auth()?;
    if logout {
        auth.logout()?;
        println!("Stored Gmail tokens cleared");
        return Ok(());
    }

    if auth.is_authenticated() {
        println!("Already authenticated with Gmail");
        return Ok(());
    }

    auth.interactive_authenticate()?;
    println!("Gmail authentication complete");
    Ok(())
}

fn folders() -> Result<()> {
    let client = ews_client()?;
    let folders = client.folders()?;

    if folders.is_empty() {
        println!("No folders found");
        return Ok(());
    }

    println!("{:<40} {:>8} {:>8}", "Folder", "Total", "Unread");
    for folder in folders {
        println!(
            "{:<40} {:>8} {:>8}",
            folder.display_name,
            count(folder.total_count),
            count(folder.unread_count)
        );
    }
    Ok(())
}

fn status() -> Result<()> {
    let store = state_store()?;
    let snapshot = store.load()?;

    println!("State file: {}", store.path().display());
    if snapshot.watermarks.is_empty() {
        println!("Watermarks: none (no completed pass yet)");
    } else {
        println!("Watermarks:");
        let mut entries: Vec<_> = snapshot.watermarks.iter().collect();
        entries.sort_by_key(|(key, _)| key.clone());
        for (key, watermark) in entries {
            println!("  {}: {}", key, watermark.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    println!("Seen identifiers: {}", snapshot.seen.len());
    println!(
        "Cached duplicates: {} ({} in the last 7 days)",
        snapshot.duplicates.len(),
        snapshot.duplicates.recent_count(7)
    );

    // Destination label counts are informative only; status must still
    // work offline
    match destination_summary() {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(e) => warn!("Could not query Gmail for label counts: {:#}", e),
    }

    Ok(())
}

fn destination_summary() -> Result<Vec<String>> {
    let settings = SyncSettings::from_env();
    let client = gmail_client()?;

    let profile = client.profile()?;
    let mut lines = vec![format!(
        "Gmail account: {} ({} message(s))",
        profile.email_address,
        profile
            .messages_total
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string())
    )];

    let label_id = client.ensure_label_id(&settings.sent_label)?;
    let label = client.label_stats(&label_id)?;
    lines.push(format!(
        "Label '{}': {} message(s), {} unread",
        label.name,
        label.messages_total.unwrap_or(0),
        label.messages_unread.unwrap_or(0)
    ));

    Ok(lines)
}

fn count(value: Option<u32>) -> String {
    value.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string())
}

fn ews_client() -> Result<EwsClient> {
    let credentials = EwsCredentials::from_env()?;
    Ok(EwsClient::new(&credentials))
}

fn gmail_auth() -> Result<GmailAuth> {
    let credentials = GmailCredentials::load()?;
    GmailAuth::new(credentials.client_id, credentials.client_secret)
}

fn gmail_client() -> Result<GmailClient> {
    Ok(GmailClient::new(gmail_auth()?))
}

fn state_store() -> Result<FileStateStore> {
    let path = config::state_path().context("Could not determine state directory")?;
    FileStateStore::new(path)
}
