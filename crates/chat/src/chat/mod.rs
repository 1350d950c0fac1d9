/// User intents routed through the presenter or the surface.
pub mod events;
pub mod message_input;
pub mod presenter;
pub mod scroll_manager;
/// Rendering contracts between the presenter and a concrete surface.
pub mod surface;

pub use events::ConversationAction;
pub use message_input::{DEFAULT_PLACEHOLDER, MessageInput};
pub use presenter::{ConversationPresenter, SyncOutcome};
pub use scroll_manager::{LastElementTrigger, ScrollManager, Viewport};
pub use surface::{ConversationSurface, MessageRow, RowKey};
