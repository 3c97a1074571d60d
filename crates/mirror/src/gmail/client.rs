//! Gmail API HTTP client
//!
//! Import-side surface of the Gmail API: message import, duplicate search
//! by Message-ID header, and label management. Uses synchronous HTTP
//! (ureq) with a fixed per-call timeout. Implements the engine's
//! [`MailDestination`] seam.

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use ureq::Agent;

use super::api::{
    CreateLabelRequest, ImportRequest, ImportResponse, Label, ListLabelsResponse,
    ListMessagesResponse, ModifyRequest, ProfileResponse,
};
use super::GmailAuth;
use crate::models::MessageId;
use crate::sync::MailDestination;

/// Gmail API client for importing messages
pub struct GmailClient {
    auth: GmailAuth,
    agent: Agent,
    /// Label name -> id, loaded lazily and kept for the client's lifetime
    labels: Mutex<HashMap<String, String>>,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Per-call network timeout
    const CALL_TIMEOUT_SECS: u64 = 60;

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(Self::CALL_TIMEOUT_SECS)))
            .build();

        Self {
            auth,
            agent: config.new_agent(),
            labels: Mutex::new(HashMap::new()),
        }
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.get_access_token()?))
    }

    /// Import raw RFC 2822 bytes, dating the message by its own header.
    ///
    /// Returns the Gmail-assigned message id. The message is marked unread
    /// afterwards so it surfaces in the destination inbox; that step is
    /// best-effort and never fails the import.
    pub fn import_raw(&self, raw: &[u8], label_ids: &[String]) -> Result<String> {
        let url = format!(
            "{}/users/me/messages/import?internalDateSource=dateHeader",
            Self::BASE_URL
        );

        let request = ImportRequest {
            raw: BASE64_URL_SAFE.encode(raw),
            label_ids: if label_ids.is_empty() {
                None
            } else {
                Some(label_ids.to_vec())
            },
        };

        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(&request)
            .context("Failed to send import request")?;

        let imported: ImportResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse import response")?;

        if let Err(e) = self.mark_unread(&imported.id) {
            warn!("Could not mark {} as unread: {:#}", imported.id, e);
        }

        Ok(imported.id)
    }

    fn mark_unread(&self, id: &str) -> Result<()> {
        let url = format!("{}/users/me/messages/{}/modify", Self::BASE_URL, id);
        self.agent
            .post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(&ModifyRequest {
                add_label_ids: vec!["UNREAD".to_string()],
            })
            .context("Failed to send modify request")?;
        Ok(())
    }

    /// Whether a message with this Message-ID header already exists,
    /// searched via the rfc822msgid operator
    pub fn find_by_message_id(&self, id: &MessageId) -> Result<bool> {
        let url = format!(
            "{}/users/me/messages?q={}&maxResults=1",
            Self::BASE_URL,
            urlencoding::encode(&duplicate_query(id))
        );

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send duplicate search request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse duplicate search response")?;

        Ok(list.messages.is_some_and(|m| !m.is_empty()))
    }

    /// Resolve a label name to its id, creating the label if missing
    pub fn ensure_label_id(&self, name: &str) -> Result<String> {
        let mut labels = self.labels.lock().unwrap();
        if labels.is_empty() {
            *labels = self.list_labels()?;
        }
        if let Some(id) = labels.get(name) {
            return Ok(id.clone());
        }

        debug!("Label '{}' not found; creating it", name);
        let url = format!("{}/users/me/labels", Self::BASE_URL);
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(&CreateLabelRequest {
                name: name.to_string(),
            })
            .context("Failed to send create label request")?;

        let label: Label = response
            .body_mut()
            .read_json()
            .context("Failed to parse create label response")?;

        labels.insert(label.name, label.id.clone());
        Ok(label.id)
    }

    /// Fetch name -> id for all labels
    fn list_labels(&self) -> Result<HashMap<String, String>> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send list labels request")?;

        let list: ListLabelsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse labels response")?;

        Ok(list
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| (l.name, l.id))
            .collect())
    }

    /// Message counts for a label, for status reporting
    pub fn label_stats(&self, label_id: &str) -> Result<Label> {
        let url = format!("{}/users/me/labels/{}", Self::BASE_URL, label_id);
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send label stats request")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse label stats response")
    }

    /// The authenticated account's profile
    pub fn profile(&self) -> Result<ProfileResponse> {
        let url = format!("{}/users/me/profile", Self::BASE_URL);
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send profile request")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse profile response")
    }

    /// Check if the client is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }
}

impl MailDestination for GmailClient {
    fn import(&self, raw: &[u8], label_ids: &[String]) -> Result<String> {
        self.import_raw(raw, label_ids)
    }

    fn message_exists(&self, id: &MessageId) -> Result<bool> {
        self.find_by_message_id(id)
    }

    fn ensure_label(&self, name: &str) -> Result<String> {
        self.ensure_label_id(name)
    }

    fn verify(&self) -> Result<()> {
        let profile = self.profile().context("Gmail connectivity check failed")?;
        debug!("Gmail profile verified: {}", profile.email_address);
        Ok(())
    }
}

/// The Gmail search query matching a Message-ID header exactly.
///
/// Embedded quotes are stripped so a malformed identifier cannot break out
/// of the quoted operator value.
fn duplicate_query(id: &MessageId) -> String {
    format!("rfc822msgid:\"{}\"", id.as_str().replace('"', ""))
}
