use super::ids::MessageId;

/// One persisted chat message. Records are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRecord {
    pub id: MessageId,
    /// Insertion sequence; display order is ascending `seq`.
    pub seq: u64,
    pub created_at_unix_millis: u64,
    pub text: String,
}

/// Input for [`crate::MessageStore::create`]. Text is stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
}

impl NewMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Mutation published by [`crate::NotifyingStore`] after it has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Created(MessageRecord),
    Deleted(MessageId),
    Cleared { removed: usize },
}
