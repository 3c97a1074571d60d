//! EWS HTTP client
//!
//! Blocking SOAP client for the Exchange mailbox, authenticated with HTTP
//! Basic credentials. Implements the engine's [`MailSource`] seam.

use anyhow::{Context, Result};
use base64::prelude::*;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::time::Duration;
use ureq::Agent;

use super::{soap, FolderInfo, ItemSummary};
use crate::config::EwsCredentials;
use crate::models::{EmailAddress, MessageCandidate, MessageId, OrderingField, SyncFolder};
use crate::sync::MailSource;

/// EWS client for listing and fetching mailbox items
pub struct EwsClient {
    agent: Agent,
    endpoint: String,
    mailbox: String,
    authorization: String,
}

impl EwsClient {
    /// Per-call network timeout; the engine has no whole-pass timeout
    const CALL_TIMEOUT_SECS: u64 = 60;

    /// FindItem page size
    const PAGE_SIZE: usize = 100;

    /// Items per batched GetItem call
    const GET_CHUNK_SIZE: usize = 10;

    const MAX_RETRIES: u32 = 3;

    pub fn new(credentials: &EwsCredentials) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(Self::CALL_TIMEOUT_SECS)))
            .build();

        let authorization = format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{}:{}", credentials.username, credentials.password))
        );

        Self {
            agent: config.new_agent(),
            endpoint: credentials.endpoint(),
            mailbox: credentials.email.clone(),
            authorization,
        }
    }

    /// The distinguished folder id EWS uses for a sync folder
    fn distinguished_id(folder: SyncFolder) -> &'static str {
        match folder {
            SyncFolder::Inbox => "inbox",
            SyncFolder::Sent => "sentitems",
        }
    }

    fn call(&self, soap: &str) -> Result<String> {
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &self.authorization)
            .header("Content-Type", "text/xml; charset=utf-8")
            .send(soap)
            .context("EWS request failed")?;

        response
            .body_mut()
            .read_to_string()
            .context("Failed to read EWS response body")
    }

    /// List item summaries in a folder, strictly newer than `newer_than`,
    /// ascending by the given field, paging until the server reports the
    /// last item or `limit` is satisfied.
    fn find_items(
        &self,
        folder: SyncFolder,
        ordering: OrderingField,
        newer_than: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<ItemSummary>> {
        let folder_id = Self::distinguished_id(folder);
        let mut items: Vec<ItemSummary> = Vec::new();

        loop {
            let page_size = match limit {
                Some(l) => (l - items.len()).min(Self::PAGE_SIZE),
                None => Self::PAGE_SIZE,
            };

            let request = soap::find_item_request(
                &self.mailbox,
                folder_id,
                ordering,
                newer_than,
                items.len(),
                page_size,
            );
            let response = self.call(&request)?;
            let page = soap::parse_find_item_response(&response)
                .with_context(|| format!("FindItem failed for {}", folder))?;

            debug!(
                "{}: FindItem page of {} item(s), includes_last={}",
                folder,
                page.items.len(),
                page.includes_last
            );

            let empty_page = page.items.is_empty();
            items.extend(page.items);

            let satisfied = limit.is_some_and(|l| items.len() >= l);
            if page.includes_last || satisfied || empty_page {
                break;
            }
        }

        if let Some(l) = limit {
            items.truncate(l);
        }
        Ok(items)
    }

    /// Fetch raw MIME bytes for the given item ids, in chunks with retry.
    ///
    /// A chunk that still fails after retries is an error: the caller must
    /// not let the watermark advance past an unfetched message.
    fn fetch_mime(&self, item_ids: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let mut out = HashMap::with_capacity(item_ids.len());

        for chunk in item_ids.chunks(Self::GET_CHUNK_SIZE) {
            let pairs = self.get_items_with_retry(chunk, Self::MAX_RETRIES)?;
            for (id, content) in pairs {
                // EWS may wrap the base64 payload across lines
                let compact: String = content.split_whitespace().collect();
                let bytes = BASE64_STANDARD
                    .decode(compact)
                    .with_context(|| format!("Invalid MimeContent encoding for item {}", id))?;
                out.insert(id, bytes);
            }
        }

        Ok(out)
    }

    /// Batched GetItem with exponential backoff
    fn get_items_with_retry(
        &self,
        item_ids: &[String],
        max_retries: u32,
    ) -> Result<Vec<(String, String)>> {
        let request = soap::get_item_request(item_ids);
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..max_retries {
            match self
                .call(&request)
                .and_then(|xml| soap::parse_get_item_response(&xml))
            {
                Ok(items) => return Ok(items),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries - 1 {
                        let jitter = Duration::from_millis(rand_jitter());
                        std::thread::sleep(delay + jitter);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap().context("GetItem failed after retries"))
    }

    /// Shallow folder listing under the message folder root
    pub fn folders(&self) -> Result<Vec<FolderInfo>> {
        let request = soap::find_folder_request(&self.mailbox);
        let response = self.call(&request)?;
        soap::parse_find_folder_response(&response)
    }
}

impl MailSource for EwsClient {
    fn list(
        &self,
        folder: SyncFolder,
        ordering: OrderingField,
        newer_than: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageCandidate>> {
        let summaries = self.find_items(folder, ordering, newer_than, limit)?;
        if summaries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = summaries.iter().map(|s| s.item_id.clone()).collect();
        let mut mime = self.fetch_mime(&ids)?;

        let mut candidates = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(raw) = mime.remove(&summary.item_id) else {
                // Listed but gone by GetItem time, likely deleted in between
                warn!(
                    "{}: item {} vanished between FindItem and GetItem; skipping",
                    folder, summary.item_id
                );
                continue;
            };

            candidates.push(MessageCandidate {
                identifier: summary.message_id.map(MessageId::from),
                raw,
                subject: summary.subject,
                sender: summary.sender.as_deref().map(EmailAddress::parse),
                received_at: summary.received_at,
                sent_at: summary.sent_at,
            });
        }

        Ok(candidates)
    }

    fn verify(&self) -> Result<()> {
        self.folders()
            .map(|_| ())
            .context("EWS connectivity check failed")
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_folder_ids() {
        assert_eq!(EwsClient::distinguished_id(SyncFolder::Inbox), "inbox");
        assert_eq!(EwsClient::distinguished_id(SyncFolder::Sent), "sentitems");
    }

    #[test]
    fn test_endpoint_from_credentials() {
        let creds = EwsCredentials {
            server: "mail.example.com".to_string(),
            email: "user@example.com".to_string(),
            username: "DOMAIN\\user".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(creds.endpoint(), "https://mail.example.com/EWS/Exchange.asmx");
    }
}
