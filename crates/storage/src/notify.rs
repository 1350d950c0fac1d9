use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use super::error::StorageResult;
use super::ids::MessageId;
use super::types::{MessageRecord, NewMessage, StoreChange};
use super::MessageStore;

/// Buffered changes per subscriber before it is reported as lagged.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// Wraps a store and publishes every applied mutation to subscribers.
///
/// Events are sent only after the inner store call succeeded, so an observer
/// that sees a change can immediately read it back through [`MessageStore::list`].
pub struct NotifyingStore<S> {
    inner: S,
    changes: broadcast::Sender<StoreChange>,
}

impl<S: MessageStore> NotifyingStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_CHANGE_CAPACITY)
    }

    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self { inner, changes }
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.changes.subscribe(),
        }
    }

    fn publish(&self, change: StoreChange) {
        // A send error only means nobody is subscribed right now.
        let _ = self.changes.send(change);
    }
}

impl<S: MessageStore> MessageStore for NotifyingStore<S> {
    fn create(&self, input: NewMessage) -> StorageResult<MessageRecord> {
        let record = self.inner.create(input)?;
        tracing::debug!(message_id = %record.id, seq = record.seq, "message created");
        self.publish(StoreChange::Created(record.clone()));
        Ok(record)
    }

    fn list(&self) -> StorageResult<Vec<MessageRecord>> {
        self.inner.list()
    }

    fn get(&self, message_id: MessageId) -> StorageResult<Option<MessageRecord>> {
        self.inner.get(message_id)
    }

    fn delete(&self, message_id: MessageId) -> StorageResult<bool> {
        let removed = self.inner.delete(message_id)?;
        if removed {
            tracing::debug!(%message_id, "message deleted");
            self.publish(StoreChange::Deleted(message_id));
        } else {
            tracing::trace!(%message_id, "delete ignored for unknown message");
        }
        Ok(removed)
    }

    fn delete_all(&self) -> StorageResult<usize> {
        let removed = self.inner.delete_all()?;
        if removed > 0 {
            tracing::debug!(removed, "all messages deleted");
            self.publish(StoreChange::Cleared { removed });
        }
        Ok(removed)
    }

    fn count(&self) -> StorageResult<usize> {
        self.inner.count()
    }
}

/// Changes collected by one [`ChangeSubscription::drain`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changes: Vec<StoreChange>,
    /// Some changes were dropped; the observer must resync from the store.
    pub lagged: bool,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.lagged
    }
}

/// Receiving side of a [`NotifyingStore`]; drained on the observer's own thread.
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<StoreChange>,
}

impl ChangeSubscription {
    /// Takes every change published since the previous drain without blocking.
    pub fn drain(&mut self) -> ChangeBatch {
        let mut batch = ChangeBatch::default();
        loop {
            match self.receiver.try_recv() {
                Ok(change) => batch.changes.push(change),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "store change subscriber lagged");
                    batch.lagged = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        batch
    }
}
