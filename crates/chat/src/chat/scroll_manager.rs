use super::surface::RowKey;

/// Fires once for every distinct non-empty tail of the message list.
///
/// Re-rendering with an unchanged last row never fires again. An empty list
/// forgets the previous tail so the next message fires even if ids repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastElementTrigger {
    last: Option<RowKey>,
}

impl LastElementTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current tail and returns it when it differs from the previous one.
    pub fn observe(&mut self, tail: Option<&RowKey>) -> Option<RowKey> {
        if self.last.as_ref() == tail {
            return None;
        }

        self.last = tail.cloned();
        self.last.clone()
    }

    pub fn last(&self) -> Option<&RowKey> {
        self.last.as_ref()
    }
}

/// Rows visible in a bottom-anchored container of fixed height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Index of the first visible row.
    pub start: usize,
    /// One past the last visible row.
    pub end: usize,
    /// Empty lines drawn above `start` when the content is shorter than the container.
    pub padding: usize,
}

impl Viewport {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Scroll position of a bottom-anchored list, tracked as distance from the tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollManager {
    offset_from_bottom: usize,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_from_bottom(&self) -> usize {
        self.offset_from_bottom
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset_from_bottom == 0
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset_from_bottom = 0;
    }

    /// Positions `index` on the bottom edge, or as close as the content allows.
    pub fn scroll_to_row(&mut self, index: usize, row_count: usize, height: usize) {
        if index >= row_count {
            return;
        }

        self.offset_from_bottom = row_count - 1 - index;
        self.clamp(row_count, height);
    }

    pub fn scroll_up(&mut self, rows: usize, row_count: usize, height: usize) {
        self.offset_from_bottom = self.offset_from_bottom.saturating_add(rows);
        self.clamp(row_count, height);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.offset_from_bottom = self.offset_from_bottom.saturating_sub(rows);
    }

    /// Keeps the top of the content from scrolling below the top edge.
    pub fn clamp(&mut self, row_count: usize, height: usize) {
        let max_offset = row_count.saturating_sub(height.max(1));
        self.offset_from_bottom = self.offset_from_bottom.min(max_offset);
    }

    pub fn viewport(&self, row_count: usize, height: usize) -> Viewport {
        let height = height.max(1);
        let max_offset = row_count.saturating_sub(height);
        let end = row_count - self.offset_from_bottom.min(max_offset);
        let start = end.saturating_sub(height);

        Viewport {
            start,
            end,
            padding: height - (end - start),
        }
    }
}

#[cfg(test)]
mod tests {
    use chatty_storage::MessageId;

    use super::*;

    fn key() -> RowKey {
        RowKey::for_message(MessageId::new_v7())
    }

    #[test]
    fn trigger_fires_once_per_distinct_tail() {
        let mut trigger = LastElementTrigger::new();
        let hello = key();
        let world = key();

        assert_eq!(trigger.observe(Some(&hello)), Some(hello.clone()));
        assert_eq!(trigger.observe(Some(&hello)), None);
        assert_eq!(trigger.observe(Some(&world)), Some(world.clone()));
        assert_eq!(trigger.observe(Some(&world)), None);
        // Deleting the tail exposes the previous row as the new tail.
        assert_eq!(trigger.observe(Some(&hello)), Some(hello));
    }

    #[test]
    fn trigger_resets_on_empty_list() {
        let mut trigger = LastElementTrigger::new();
        let only = key();

        assert_eq!(trigger.observe(None), None);
        assert_eq!(trigger.observe(Some(&only)), Some(only.clone()));
        assert_eq!(trigger.observe(None), None);
        assert_eq!(trigger.last(), None);
        assert_eq!(trigger.observe(Some(&only)), Some(only));
    }

    #[test]
    fn short_content_is_padded_above_to_sit_on_the_bottom_edge() {
        let scroll = ScrollManager::new();
        let viewport = scroll.viewport(2, 5);

        assert_eq!(
            viewport,
            Viewport {
                start: 0,
                end: 2,
                padding: 3,
            }
        );
        assert_eq!(scroll.viewport(0, 3).padding, 3);
        assert!(scroll.viewport(0, 3).is_empty());
    }

    #[test]
    fn long_content_shows_the_tail_by_default() {
        let scroll = ScrollManager::new();
        let viewport = scroll.viewport(10, 4);

        assert_eq!(
            viewport,
            Viewport {
                start: 6,
                end: 10,
                padding: 0,
            }
        );
        assert_eq!(viewport.len(), 4);
    }

    #[test]
    fn scrolling_is_clamped_to_the_content() {
        let mut scroll = ScrollManager::new();
        scroll.scroll_up(100, 10, 4);
        assert_eq!(scroll.offset_from_bottom(), 6);
        assert_eq!(
            scroll.viewport(10, 4),
            Viewport {
                start: 0,
                end: 4,
                padding: 0,
            }
        );

        scroll.scroll_down(2);
        assert_eq!(scroll.viewport(10, 4).start, 2);

        scroll.scroll_to_row(9, 10, 4);
        assert!(scroll.is_at_bottom());
    }

    #[test]
    fn scroll_to_row_ignores_out_of_range_indices() {
        let mut scroll = ScrollManager::new();
        scroll.scroll_up(3, 10, 4);
        scroll.scroll_to_row(10, 10, 4);
        assert_eq!(scroll.offset_from_bottom(), 3);
    }
}
