//! Adapter trait definitions
//!
//! The engine only ever talks to the two remote services through these
//! traits, so tests can drive a whole pass against scripted fakes.

use crate::models::{MessageCandidate, MessageId, OrderingField, SyncFolder};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// The mailbox being mirrored from
pub trait MailSource: Send + Sync {
    /// List candidates in `folder` strictly newer than `newer_than`,
    /// ordered ascending by `ordering`. `limit` caps the number of
    /// candidates materialized; `None` means no cap.
    fn list(
        &self,
        folder: SyncFolder,
        ordering: OrderingField,
        newer_than: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageCandidate>>;

    /// Cheap connectivity check, run once at pass start
    fn verify(&self) -> Result<()>;
}

/// The mail service being mirrored into
pub trait MailDestination: Send + Sync {
    /// Import raw RFC 2822 bytes under the given label ids.
    ///
    /// Returns the destination-assigned message id. The destination accepts
    /// duplicate imports at the protocol level; suppression is the engine's
    /// job.
    fn import(&self, raw: &[u8], label_ids: &[String]) -> Result<String>;

    /// Whether a message with this Message-ID header already exists
    fn message_exists(&self, id: &MessageId) -> Result<bool>;

    /// Resolve a label name to its destination id, creating it if missing
    fn ensure_label(&self, name: &str) -> Result<String>;

    /// Cheap connectivity check, run once at pass start
    fn verify(&self) -> Result<()>;
}
