//! Folders covered by the mirror and their ordering semantics

use std::fmt;

/// Source folders the engine mirrors
///
/// Each folder advances its own watermark under its own timestamp field:
/// inbox mail is ordered by when it arrived, sent mail by when it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFolder {
    Inbox,
    Sent,
}

impl SyncFolder {
    pub const ALL: [SyncFolder; 2] = [SyncFolder::Inbox, SyncFolder::Sent];

    /// Stable key used for watermark storage and logging
    pub fn key(&self) -> &'static str {
        match self {
            SyncFolder::Inbox => "inbox",
            SyncFolder::Sent => "sent",
        }
    }

    /// The timestamp field that orders this folder's candidates
    pub fn ordering(&self) -> OrderingField {
        match self {
            SyncFolder::Inbox => OrderingField::Received,
            SyncFolder::Sent => OrderingField::Sent,
        }
    }
}

impl fmt::Display for SyncFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which message timestamp a folder is ordered and filtered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingField {
    Received,
    Sent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_keys_are_stable() {
        assert_eq!(SyncFolder::Inbox.key(), "inbox");
        assert_eq!(SyncFolder::Sent.key(), "sent");
    }

    #[test]
    fn test_ordering_fields() {
        assert_eq!(SyncFolder::Inbox.ordering(), OrderingField::Received);
        assert_eq!(SyncFolder::Sent.ordering(), OrderingField::Sent);
    }
}
