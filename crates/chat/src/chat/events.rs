/// Intent produced by an input affordance.
///
/// Row indices are zero-based positions in the current display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    /// Send action or implicit confirm on the input field.
    Submit(String),
    /// Per-row delete; several indices model a bulk swipe/edit selection.
    DeleteRows(Vec<usize>),
    DeleteAll,
    ScrollUp(usize),
    ScrollDown(usize),
    Quit,
}
