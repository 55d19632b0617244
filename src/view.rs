// src/view.rs
//! Host-side seams for the chat client. A browser shell, a terminal, or a test
//! recorder implements these; the controller never touches a concrete UI.

use thiserror::Error;

use crate::render::RenderedMessage;

pub const WELCOME_TEXT: &str =
    "Hello! How can I assist you today? Type a prompt below to generate code.";
pub const COPY_LABEL: &str = "Copy";
pub const COPIED_LABEL: &str = "Copied!";

/// One row of the sidebar history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    pub title: String,
    pub active: bool,
}

pub trait ChatView: Send + Sync {
    fn append_message(&self, message: &RenderedMessage);
    /// Transient "..." bubble standing in for the pending AI reply.
    fn show_placeholder(&self);
    /// Replaces the placeholder with an error-styled message.
    fn show_error(&self, text: &str);
    /// Clears the placeholder; raw characters follow through `reveal_char`.
    fn begin_reveal(&self);
    fn reveal_char(&self, ch: char);
    /// Swaps the raw revealed text for the fully rendered message.
    fn finish_reveal(&self, message: &RenderedMessage);
    fn scroll_to_bottom(&self);
    fn clear(&self);
    fn show_welcome(&self);
    fn set_submit_enabled(&self, enabled: bool);
    fn render_history(&self, entries: &[HistoryEntry]);
    fn set_copy_label(&self, message_index: usize, label: &str);
    fn set_dark_mode(&self, enabled: bool);
}

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("Clipboard IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}
