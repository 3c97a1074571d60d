//! Configuration loading for the mirror engine
//!
//! Exchange credentials and sync tuning come from environment variables
//! (the engine runs as a scheduled batch job). Gmail OAuth client
//! credentials support (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Credentials filename in the Ferry config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Exchange mailbox access over EWS
#[derive(Debug, Clone)]
pub struct EwsCredentials {
    /// EWS server hostname, e.g. "mail.example.com"
    pub server: String,
    /// Primary SMTP address of the mirrored mailbox
    pub email: String,
    /// Account username, typically DOMAIN\\user
    pub username: String,
    pub password: String,
}

impl EwsCredentials {
    /// Load Exchange credentials from the environment. Missing values are
    /// fatal: a pass must never start half-configured.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: require_env("EWS_SERVER")?,
            email: require_env("EXCHANGE_EMAIL")?,
            username: require_env("EXCHANGE_USERNAME")?,
            password: require_env("EXCHANGE_PASSWORD")?,
        })
    }

    /// The SOAP endpoint this server exposes
    pub fn endpoint(&self) -> String {
        format!("https://{}/EWS/Exchange.asmx", self.server)
    }
}

fn require_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("{} environment variable not set", name))?;
    if value.is_empty() {
        anyhow::bail!("{} environment variable is empty", name);
    }
    Ok(value)
}

/// Tuning for the sync engine, all overridable from the environment
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Age window for fast passes, in days (IMPORT_LAST_DAYS)
    pub import_last_days: u32,
    /// Larger age window for deep passes (DEEP_IMPORT_LAST_DAYS); falls back
    /// to the fast window when unset
    pub deep_import_last_days: Option<u32>,
    /// Trailing re-scan window before the watermark (SYNC_GRACE_MINUTES)
    pub grace_minutes: u32,
    /// Duplicate cache record lifetime (DUPLICATE_MAX_AGE_DAYS)
    pub duplicate_max_age_days: u32,
    /// Global duplicate-check switch (CHECK_DUPLICATES)
    pub check_duplicates: bool,
    /// Gmail label applied to mirrored sent mail (SENT_LABEL)
    pub sent_label: String,
    /// Item ceiling for test passes, shared across folders (TEST_LIMIT)
    pub test_limit: usize,
    /// Whether test passes default to dry-run (TEST_DRY_RUN)
    pub test_dry_run: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            import_last_days: 2,
            deep_import_last_days: None,
            grace_minutes: 180,
            duplicate_max_age_days: 30,
            check_duplicates: true,
            sent_label: "Exchange/Sent".to_string(),
            test_limit: 5,
            test_dry_run: true,
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            import_last_days: env_parse("IMPORT_LAST_DAYS", defaults.import_last_days),
            deep_import_last_days: env_parse_opt("DEEP_IMPORT_LAST_DAYS"),
            grace_minutes: env_parse("SYNC_GRACE_MINUTES", defaults.grace_minutes),
            duplicate_max_age_days: env_parse(
                "DUPLICATE_MAX_AGE_DAYS",
                defaults.duplicate_max_age_days,
            ),
            check_duplicates: env_flag("CHECK_DUPLICATES", defaults.check_duplicates),
            sent_label: std::env::var("SENT_LABEL").unwrap_or(defaults.sent_label),
            test_limit: env_parse("TEST_LIMIT", defaults.test_limit),
            test_dry_run: env_flag("TEST_DRY_RUN", defaults.test_dry_run),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_parse_opt<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => !matches!(v.as_str(), "0" | "false" | "no" | ""),
        Err(_) => default,
    }
}

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/ferry/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Get the default credentials file path (~/.config/ferry/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret"
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
    }

    #[test]
    fn test_invalid_credentials_json() {
        let json = r#"{ "other": {} }"#;
        assert!(GmailCredentials::from_json(json).is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.import_last_days, 2);
        assert_eq!(settings.grace_minutes, 180);
        assert_eq!(settings.duplicate_max_age_days, 30);
        assert!(settings.check_duplicates);
        assert_eq!(settings.sent_label, "Exchange/Sent");
        assert_eq!(settings.test_limit, 5);
        assert!(settings.test_dry_run);
        assert_eq!(settings.deep_import_last_days, None);
    }
}
