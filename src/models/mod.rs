pub mod chat;

pub use chat::{derive_title, Conversation, Message, Role};
