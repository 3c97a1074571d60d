//! Exchange Web Services integration
//!
//! This module provides:
//! - SOAP envelope construction and response parsing
//! - A blocking EWS client implementing the engine's source seam

mod client;
mod soap;

pub use client::EwsClient;

use chrono::{DateTime, Utc};

/// An EWS operation that reached the server but was rejected by it
#[derive(Debug, thiserror::Error)]
#[error("EWS responded with {code}: {message}")]
pub struct EwsResponseError {
    /// ResponseCode from the response message, e.g. "ErrorItemNotFound"
    pub code: String,
    /// Human-readable MessageText accompanying the code
    pub message: String,
}

/// Folder metadata from a shallow FindFolder
#[derive(Debug, Clone)]
pub struct FolderInfo {
    pub display_name: String,
    pub total_count: Option<u32>,
    pub unread_count: Option<u32>,
}

/// One FindItem row: everything but the raw MIME bytes
#[derive(Debug, Clone, Default)]
pub(crate) struct ItemSummary {
    pub item_id: String,
    pub message_id: Option<String>,
    pub subject: String,
    pub sender: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}
