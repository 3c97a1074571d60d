//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow and token management
//! - Gmail API client for importing messages and checking duplicates

mod auth;
mod client;

pub use auth::GmailAuth;
pub use client::GmailClient;

/// Gmail API request/response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Body for users.messages.import
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImportRequest {
        /// URL-safe base64 of the raw RFC 2822 message
        pub raw: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub label_ids: Option<Vec<String>>,
    }

    /// Response from users.messages.import
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImportResponse {
        pub id: String,
    }

    /// Body for users.messages.modify
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyRequest {
        pub add_label_ids: Vec<String>,
    }

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<Label>>,
    }

    /// A Gmail label; message counts are only populated by labels.get
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Label {
        pub id: String,
        pub name: String,
        pub messages_total: Option<u64>,
        pub messages_unread: Option<u64>,
    }

    /// Body for users.labels.create
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateLabelRequest {
        pub name: String,
    }

    /// Response from users.getProfile
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        pub email_address: String,
        pub messages_total: Option<u64>,
    }

}
