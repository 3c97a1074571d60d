//! Message types shared between the source adapter and the sync engine

use super::OrderingField;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RFC 2822 Message-ID header value, the identity used for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        // Try to parse "Name <email>" format
        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        // Otherwise, treat the whole string as an email
        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A message offered by the source for import consideration
///
/// Candidates are ephemeral: the source adapter materializes them for one
/// folder pass and the engine never stores them. `identifier` is absent when
/// the source message carries no Message-ID header; such messages are always
/// imported (duplicate status cannot be established for them).
#[derive(Debug, Clone)]
pub struct MessageCandidate {
    /// Message-ID header, if the source exposed one
    pub identifier: Option<MessageId>,
    /// Full RFC 2822 message bytes
    pub raw: Vec<u8>,
    /// Subject line
    pub subject: String,
    /// Sender, as reported by the source
    pub sender: Option<EmailAddress>,
    /// When the source received the message
    pub received_at: Option<DateTime<Utc>>,
    /// When the message was sent
    pub sent_at: Option<DateTime<Utc>>,
}

impl MessageCandidate {
    /// Create a new candidate builder
    pub fn builder() -> MessageCandidateBuilder {
        MessageCandidateBuilder::default()
    }

    /// The timestamp used for ordering and watermark advancement in a
    /// folder synced on the given field
    pub fn timestamp(&self, field: OrderingField) -> Option<DateTime<Utc>> {
        match field {
            OrderingField::Received => self.received_at,
            OrderingField::Sent => self.sent_at,
        }
    }

    /// Best available observation time, for duplicate records
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.received_at.or(self.sent_at)
    }
}

/// Builder for creating MessageCandidate instances
#[derive(Default)]
pub struct MessageCandidateBuilder {
    identifier: Option<MessageId>,
    raw: Vec<u8>,
    subject: String,
    sender: Option<EmailAddress>,
    received_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
}

impl MessageCandidateBuilder {
    pub fn identifier(mut self, id: impl Into<MessageId>) -> Self {
        self.identifier = Some(id.into());
        self
    }

    pub fn raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn sender(mut self, sender: EmailAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn sent_at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    pub fn build(self) -> MessageCandidate {
        MessageCandidate {
            identifier: self.identifier,
            raw: self.raw,
            subject: self.subject,
            sender: self.sender,
            received_at: self.received_at,
            sent_at: self.sent_at,
        }
    }
}
