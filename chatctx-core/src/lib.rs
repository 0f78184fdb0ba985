pub mod config;
pub mod error;
pub mod llm;
pub mod models;

pub use config::ChatCtxConfig;
pub use error::ChatCtxError;
pub use llm::{ChatCompletionClient, CompletionBackend, LlmError, LlmSettings};
pub use models::{CleanedMessage, ContextProfile, Conversation, ConversationMeta, Role};
