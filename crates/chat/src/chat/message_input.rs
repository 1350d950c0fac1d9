/// Placeholder hint shown by surfaces while the buffer is empty.
pub const DEFAULT_PLACEHOLDER: &str = "Message";

/// Single-line text entry backing the send control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInput {
    text: String,
    placeholder: String,
}

impl MessageInput {
    pub fn new() -> Self {
        Self::with_placeholder(DEFAULT_PLACEHOLDER)
    }

    pub fn with_placeholder(placeholder: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            placeholder: placeholder.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// True when the buffer holds something other than whitespace.
    pub fn has_content(&self) -> bool {
        has_content(&self.text)
    }

    /// Mirrors the enabled state of the send control.
    pub fn can_submit(&self) -> bool {
        self.has_content()
    }
}

impl Default for MessageInput {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn has_content(raw: &str) -> bool {
    !raw.trim().is_empty()
}
