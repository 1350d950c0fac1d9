use std::sync::{Mutex, MutexGuard};

use super::error::{StorageError, StorageResult};
use super::ids::MessageId;
use super::types::{MessageRecord, NewMessage};
use super::{MessageStore, unix_timestamp_millis};

#[derive(Debug, Default)]
struct MemoryState {
    messages: Vec<MessageRecord>,
    next_seq: u64,
}

/// Process-local store with the same ordering and id rules as the sqlite backend.
///
/// Nothing survives the process; useful for previews and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, stage: &'static str) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::MemoryLockPoisoned { stage })
    }
}

impl MessageStore for MemoryStorage {
    fn create(&self, input: NewMessage) -> StorageResult<MessageRecord> {
        let mut state = self.lock("memory-create")?;
        state.next_seq += 1;
        let record = MessageRecord {
            id: MessageId::new_v7(),
            seq: state.next_seq,
            created_at_unix_millis: unix_timestamp_millis(),
            text: input.text,
        };
        state.messages.push(record.clone());
        Ok(record)
    }

    fn list(&self) -> StorageResult<Vec<MessageRecord>> {
        Ok(self.lock("memory-list")?.messages.clone())
    }

    fn get(&self, message_id: MessageId) -> StorageResult<Option<MessageRecord>> {
        Ok(self
            .lock("memory-get")?
            .messages
            .iter()
            .find(|message| message.id == message_id)
            .cloned())
    }

    fn delete(&self, message_id: MessageId) -> StorageResult<bool> {
        let mut state = self.lock("memory-delete")?;
        let before = state.messages.len();
        state.messages.retain(|message| message.id != message_id);
        Ok(state.messages.len() != before)
    }

    fn delete_all(&self) -> StorageResult<usize> {
        let mut state = self.lock("memory-delete-all")?;
        let removed = state.messages.len();
        state.messages.clear();
        Ok(removed)
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.lock("memory-count")?.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn list_preserves_creation_order_with_distinct_ids() {
        let store = MemoryStorage::new();
        for text in ["one", "two", "three"] {
            store.create(NewMessage::new(text)).expect("create");
        }

        let listed = store.list().expect("list");
        let texts = listed.iter().map(|m| m.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, ["one", "two", "three"]);

        let ids = listed.iter().map(|m| m.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 3);
        assert!(listed.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    }

    #[test]
    fn create_stores_text_verbatim_without_validation() {
        let store = MemoryStorage::new();
        let blank = store.create(NewMessage::new("   ")).expect("create blank");
        let padded = store.create(NewMessage::new("  hi  ")).expect("create padded");

        assert_eq!(blank.text, "   ");
        assert_eq!(padded.text, "  hi  ");
        assert_eq!(store.count().expect("count"), 2);
    }

    #[test]
    fn delete_removes_only_the_matching_record() {
        let store = MemoryStorage::new();
        let first = store.create(NewMessage::new("a")).expect("create");
        let middle = store.create(NewMessage::new("b")).expect("create");
        let last = store.create(NewMessage::new("c")).expect("create");

        assert!(store.delete(middle.id).expect("delete"));
        assert!(!store.delete(middle.id).expect("repeat delete is a no-op"));
        assert!(!store.delete(MessageId::new_v7()).expect("unknown delete"));

        assert_eq!(store.list().expect("list"), vec![first, last]);
        assert_eq!(store.get(middle.id).expect("get"), None);
    }

    #[test]
    fn delete_all_then_create_starts_a_fresh_list() {
        let store = MemoryStorage::new();
        store.create(NewMessage::new("hello")).expect("create");
        store.create(NewMessage::new("world")).expect("create");

        assert_eq!(store.delete_all().expect("delete all"), 2);
        assert!(store.list().expect("list").is_empty());

        let hi = store.create(NewMessage::new("hi")).expect("create");
        assert_eq!(store.list().expect("list"), vec![hi]);
    }
}
