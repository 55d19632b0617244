// src/models/chat.rs
use serde::{Deserialize, Serialize};

pub const TITLE_CHARS: usize = 30;
pub const TITLE_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// A persisted chat. `id` is the creation time in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub messages: Vec<Message>,
}

/// Title shown in the history list: the first 30 characters of the opening
/// message, trimmed, followed by an ellipsis.
pub fn derive_title(first_message: &str) -> String {
    let head: String = first_message.chars().take(TITLE_CHARS).collect();
    format!("{}{}", head.trim(), TITLE_ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_truncates_to_thirty_chars() {
        let title = derive_title("write a function that adds two numbers in Python");
        assert_eq!(title, "write a function that adds two...");
    }

    #[test]
    fn test_derive_title_short_prompt_still_gets_ellipsis() {
        assert_eq!(derive_title("  hi  "), "hi...");
    }

    #[test]
    fn test_derive_title_counts_characters_not_bytes() {
        let prompt = "é".repeat(40);
        assert_eq!(derive_title(&prompt), format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(Message::ai("done")).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "ai", "content": "done" }));

        let parsed: Conversation = serde_json::from_str(
            r#"{"id":1700000000000,"title":"hi...","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.messages, vec![Message::user("hi")]);
    }
}
