pub mod message;
pub mod profile;

pub use message::{CleanedMessage, Conversation, ConversationMeta, Role};
pub use profile::{ContextProfile, EventDescriptor};
