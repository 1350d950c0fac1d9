use std::collections::BTreeSet;

use chatty_storage::{
    ChangeSubscription, MessageRecord, MessageStore, NewMessage, NotifyingStore, StorageResult,
};

use super::message_input::{MessageInput, has_content};
use super::scroll_manager::LastElementTrigger;
use super::surface::{ConversationSurface, MessageRow, RowKey};

/// What one [`ConversationPresenter::sync`] call did to the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub rendered: bool,
    pub scrolled_to: Option<RowKey>,
}

/// Mediates input, rendering and auto-scroll against a message store.
///
/// The presenter owns the store and is its only writer through this type.
/// It never caches messages: every render reads the store's current list.
pub struct ConversationPresenter<S: MessageStore> {
    store: NotifyingStore<S>,
    changes: ChangeSubscription,
    input: MessageInput,
    tail: LastElementTrigger,
    needs_render: bool,
}

impl<S: MessageStore> ConversationPresenter<S> {
    pub fn new(store: S) -> Self {
        Self::with_notifier(NotifyingStore::new(store))
    }

    pub fn with_notifier(store: NotifyingStore<S>) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            changes,
            input: MessageInput::new(),
            tail: LastElementTrigger::new(),
            // First sync always draws whatever was persisted before startup.
            needs_render: true,
        }
    }

    pub fn store(&self) -> &NotifyingStore<S> {
        &self.store
    }

    pub fn input(&self) -> &MessageInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut MessageInput {
        &mut self.input
    }

    /// Creates a message from `raw` when it has non-whitespace content.
    ///
    /// The stored text is `raw` unchanged. Whitespace-only input is ignored
    /// and leaves the input buffer as it was.
    pub fn submit(&mut self, raw: &str) -> StorageResult<Option<MessageRecord>> {
        if !has_content(raw) {
            tracing::trace!("ignored submit without content");
            return Ok(None);
        }

        let record = self.store.create(NewMessage::new(raw))?;
        self.input.clear();
        Ok(Some(record))
    }

    /// Submits the current input buffer.
    pub fn submit_input(&mut self) -> StorageResult<Option<MessageRecord>> {
        let raw = self.input.text().to_string();
        self.submit(&raw)
    }

    /// Current rows in store order, keyed by message id.
    pub fn render(&self) -> StorageResult<Vec<MessageRow>> {
        Ok(self.store.list()?.iter().map(MessageRow::from).collect())
    }

    /// Applies pending store changes to `surface`.
    ///
    /// Rows are rendered first; only then, if the newest row differs from the
    /// one seen on the previous render, the surface is scrolled to it.
    pub fn sync(&mut self, surface: &mut impl ConversationSurface) -> StorageResult<SyncOutcome> {
        let batch = self.changes.drain();
        if batch.is_empty() && !self.needs_render {
            return Ok(SyncOutcome::default());
        }

        let rows = self.render()?;
        surface.render_rows(&rows);
        self.needs_render = false;

        let scrolled_to = self.tail.observe(rows.last().map(|row| &row.key));
        if let Some(key) = &scrolled_to {
            surface.scroll_to(key);
        }

        tracing::debug!(
            rows = rows.len(),
            changes = batch.changes.len(),
            lagged = batch.lagged,
            scrolled = scrolled_to.is_some(),
            "conversation synced"
        );

        Ok(SyncOutcome {
            rendered: true,
            scrolled_to,
        })
    }

    /// Deletes the row at `index` in display order. Out-of-range is a no-op.
    pub fn delete_one(&mut self, index: usize) -> StorageResult<bool> {
        Ok(self.delete_at(&[index])? == 1)
    }

    /// Deletes every row named by `offsets`, resolved against one snapshot.
    ///
    /// Returns how many messages were removed.
    pub fn delete_at(&mut self, offsets: &[usize]) -> StorageResult<usize> {
        let messages = self.store.list()?;
        let targets = offsets
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|index| messages.get(index).map(|message| message.id))
            .collect::<Vec<_>>();

        let mut removed = 0;
        for message_id in targets {
            if self.store.delete(message_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn delete_all(&mut self) -> StorageResult<usize> {
        self.store.delete_all()
    }
}
