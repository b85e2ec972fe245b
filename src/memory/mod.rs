//! 记忆层：对话历史（调用方提供）与记忆库协作方接口

pub mod conversation;
pub mod store;

pub use conversation::{tail, ConversationMemory, Message, Role};
pub use store::{InMemoryMemoryStore, MemoryItem, MemoryStore};
