pub mod error;
pub mod ids;
pub mod memory;
pub mod notify;
pub mod sqlite;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use ids::{MESSAGE_ANCHOR_PREFIX, MessageId};
pub use memory::MemoryStorage;
pub use notify::{ChangeBatch, ChangeSubscription, DEFAULT_CHANGE_CAPACITY, NotifyingStore};
pub use sqlite::SqliteStorage;
pub use types::{MessageRecord, NewMessage, StoreChange};

/// Durable, insertion-ordered message collection.
///
/// Stores accept any text; callers own content validation.
pub trait MessageStore: Send + Sync {
    fn create(&self, input: NewMessage) -> StorageResult<MessageRecord>;
    /// All messages, oldest first.
    fn list(&self) -> StorageResult<Vec<MessageRecord>>;
    fn get(&self, message_id: MessageId) -> StorageResult<Option<MessageRecord>>;
    /// Returns `false` when no message had `message_id`.
    fn delete(&self, message_id: MessageId) -> StorageResult<bool>;
    /// Removes every message in one step and returns how many were removed.
    fn delete_all(&self) -> StorageResult<usize>;
    fn count(&self) -> StorageResult<usize>;
}

impl<T> MessageStore for Box<T>
where
    T: MessageStore + ?Sized,
{
    fn create(&self, input: NewMessage) -> StorageResult<MessageRecord> {
        (**self).create(input)
    }

    fn list(&self) -> StorageResult<Vec<MessageRecord>> {
        (**self).list()
    }

    fn get(&self, message_id: MessageId) -> StorageResult<Option<MessageRecord>> {
        (**self).get(message_id)
    }

    fn delete(&self, message_id: MessageId) -> StorageResult<bool> {
        (**self).delete(message_id)
    }

    fn delete_all(&self) -> StorageResult<usize> {
        (**self).delete_all()
    }

    fn count(&self) -> StorageResult<usize> {
        (**self).count()
    }
}

pub(crate) fn unix_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0_u64, |duration| {
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
        })
}
