//! Set of message identifiers already processed

use super::MessageId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Message-IDs processed in this or any prior process lifetime
///
/// The cheapest duplicate tier: membership means the engine already imported
/// (or confirmed as duplicate-free) the message. Grows monotonically; reset
/// only by deleting the persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    ids: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id.as_str())
    }

    /// Returns true if the identifier was not already present
    pub fn insert(&mut self, id: &MessageId) -> bool {
        self.ids.insert(id.as_str().to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
