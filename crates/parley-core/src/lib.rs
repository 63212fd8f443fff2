pub mod error;
pub mod inbox;
pub mod render;
pub mod store;
pub mod typing;
pub mod view;
pub mod window;

pub use error::SendError;
pub use store::{LoadOutcome, MessageStore, StoreChange};
pub use typing::{TypingEmitter, TypingIndicator};
pub use view::ConversationView;
pub use window::ConversationWindow;
