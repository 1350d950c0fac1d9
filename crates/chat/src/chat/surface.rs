use std::fmt;

use chatty_storage::{MessageId, MessageRecord};

/// Render and scroll anchor for one message row (`message-{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(String);

impl RowKey {
    pub fn for_message(message_id: MessageId) -> Self {
        Self(message_id.anchor_key())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Read-only view of one message as handed to a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub key: RowKey,
    pub message_id: MessageId,
    pub text: String,
    pub created_at_unix_millis: u64,
}

impl From<&MessageRecord> for MessageRow {
    fn from(record: &MessageRecord) -> Self {
        Self {
            key: RowKey::for_message(record.id),
            message_id: record.id,
            text: record.text.clone(),
            created_at_unix_millis: record.created_at_unix_millis,
        }
    }
}

/// Rendering target driven by the presenter.
///
/// Within one sync, `render_rows` always runs before `scroll_to`, and the
/// scroll target is guaranteed to be among the rows just rendered.
pub trait ConversationSurface {
    /// Replaces the displayed list with `rows`, oldest first.
    fn render_rows(&mut self, rows: &[MessageRow]);
    /// Brings the row with `key` into view at the bottom edge.
    fn scroll_to(&mut self, key: &RowKey);
}
