use std::fmt;
use std::str::FromStr;

use snafu::ResultExt;
use uuid::Uuid;

use super::error::{InvalidIdSnafu, StorageError, StorageResult};

/// Prefix of the render/scroll anchor key derived from a message id.
pub const MESSAGE_ANCHOR_PREFIX: &str = "message-";

/// Stable, globally unique message identifier.
///
/// UUID v7 keeps ids roughly creation-ordered, but display order is always
/// taken from the store's sequence number, never from id comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new(raw: Uuid) -> Self {
        Self(raw)
    }

    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> StorageResult<Self> {
        let parsed = Uuid::parse_str(raw).context(InvalidIdSnafu {
            stage: "parse-message-id",
            id_type: "message-id",
            raw: raw.to_string(),
        })?;
        Ok(Self(parsed))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Key used by renderers to anchor rows and scroll targets.
    pub fn anchor_key(&self) -> String {
        format!("{MESSAGE_ANCHOR_PREFIX}{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

impl FromStr for MessageId {
    type Err = StorageError;

    fn from_str(raw: &str) -> StorageResult<Self> {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_display_output() {
        let id = MessageId::new_v7();
        let parsed: MessageId = id.to_string().parse().expect("display output should parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage_with_invalid_id_error() {
        let error = MessageId::parse("not-a-uuid").expect_err("garbage should not parse");
        assert!(matches!(
            error,
            StorageError::InvalidId {
                id_type: "message-id",
                ..
            }
        ));
    }

    #[test]
    fn anchor_key_is_prefixed_with_message() {
        let id = MessageId::new_v7();
        assert_eq!(id.anchor_key(), format!("message-{id}"));
    }
}
