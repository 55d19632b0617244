// src/bin/chat.rs
//! Terminal host for the chat client: reads prompts and slash commands from
//! stdin and paints the conversation on stdout.

use base64::Engine;
use codegen_chat::config::ClientConfig;
use codegen_chat::relay_client::HttpRelayClient;
use codegen_chat::render::{MessageAction, RenderedMessage};
use codegen_chat::store::{ConversationStore, FileStorage};
use codegen_chat::view::{ChatView, Clipboard, ClipboardError, HistoryEntry, COPIED_LABEL, WELCOME_TEXT};
use codegen_chat::{telemetry, ChatController, Command, ControllerOptions, Role};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /new  /history  /load <n>  /delete <n>  /redo  /copy  /dark on|off  /help  /quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(Command),
    LoadAt(usize),
    DeleteAt(usize),
    CopyLast,
    History,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Input::Command(Command::Submit(line.to_string())));
    }

    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let arg = parts.next();
    let position = || arg.and_then(|a| a.parse::<usize>().ok()).filter(|n| *n > 0);

    match verb {
        "/quit" | "/exit" => Some(Input::Quit),
        "/help" => Some(Input::Help),
        "/new" => Some(Input::Command(Command::NewChat)),
        "/redo" => Some(Input::Command(Command::Regenerate)),
        "/history" => Some(Input::History),
        "/copy" => Some(Input::CopyLast),
        "/load" => position().map(Input::LoadAt).or(Some(Input::Help)),
        "/delete" => position().map(Input::DeleteAt).or(Some(Input::Help)),
        "/dark" => match arg {
            Some("on") => Some(Input::Command(Command::SetDarkMode(true))),
            Some("off") => Some(Input::Command(Command::SetDarkMode(false))),
            _ => Some(Input::Help),
        },
        _ => Some(Input::Help),
    }
}

/// The slash commands that perform a message's actions.
fn actions_line(actions: &[MessageAction]) -> Option<String> {
    if actions.is_empty() {
        return None;
    }
    let labels: Vec<&str> = actions
        .iter()
        .map(|action| match action {
            MessageAction::Copy => "[/copy]",
            MessageAction::Redo => "[/redo]",
        })
        .collect();
    Some(format!("   {}\n", labels.join(" ")))
}

#[derive(Default)]
struct TerminalView {
    history: Mutex<Vec<HistoryEntry>>,
    dark: Mutex<bool>,
}

impl TerminalView {
    fn out(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn accent(&self) -> &'static str {
        match self.dark.lock() {
            Ok(dark) if *dark => "\x1b[96m",
            _ => "\x1b[34m",
        }
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn print_history(&self) {
        let entries = self.history();
        if entries.is_empty() {
            self.out("(no saved chats)\n");
            return;
        }
        for (i, entry) in entries.iter().enumerate() {
            let marker = if entry.active { "*" } else { " " };
            self.out(&format!("{} {:>2}. 💬 {}\n", marker, i + 1, entry.title));
        }
    }
}

impl ChatView for TerminalView {
    fn append_message(&self, message: &RenderedMessage) {
        match message.role {
            Role::User => self.out(&format!("\n👤 {}\n", message.source)),
            Role::Ai => self.out(&format!("\n{}🤖\x1b[0m {}\n", self.accent(), message.source)),
        }
        if let Some(line) = actions_line(&message.actions) {
            self.out(&line);
        }
    }

    fn show_placeholder(&self) {
        self.out(&format!("\n{}🤖\x1b[0m ...\r", self.accent()));
    }

    fn show_error(&self, text: &str) {
        self.out(&format!("{}🤖\x1b[0m \x1b[31m{}\x1b[0m\n", self.accent(), text));
    }

    fn begin_reveal(&self) {
        self.out(&format!("{}🤖\x1b[0m ", self.accent()));
    }

    fn reveal_char(&self, ch: char) {
        let mut buf = [0u8; 4];
        self.out(ch.encode_utf8(&mut buf));
    }

    fn finish_reveal(&self, message: &RenderedMessage) {
        self.out("\n");
        if let Some(line) = actions_line(&message.actions) {
            self.out(&line);
        }
    }

    fn scroll_to_bottom(&self) {}

    fn clear(&self) {
        self.out("\x1b[2J\x1b[H");
    }

    fn show_welcome(&self) {
        self.out(&format!("{}🤖\x1b[0m {}\n", self.accent(), WELCOME_TEXT));
    }

    fn set_submit_enabled(&self, _enabled: bool) {}

    fn render_history(&self, entries: &[HistoryEntry]) {
        if let Ok(mut history) = self.history.lock() {
            *history = entries.to_vec();
        }
    }

    fn set_copy_label(&self, _message_index: usize, label: &str) {
        if label == COPIED_LABEL {
            self.out("📋 Copied!\n");
        }
    }

    fn set_dark_mode(&self, enabled: bool) {
        if let Ok(mut dark) = self.dark.lock() {
            *dark = enabled;
        }
    }
}

/// Copies through the OSC 52 escape sequence, which most terminals forward
/// to the system clipboard, including over SSH.
struct Osc52Clipboard;

impl Clipboard for Osc52Clipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text);
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "\x1b]52;c;{}\x07", encoded)?;
        stdout.flush()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs share the terminal with the chat, so stay quiet unless asked.
    if std::env::var("RUST_LOG").is_ok() {
        telemetry::init_logging("Chat client")?;
    }

    let config = ClientConfig::from_env();
    let storage = Arc::new(FileStorage::open(&config.data_dir)?);
    let store = ConversationStore::open(storage);
    let relay = Arc::new(HttpRelayClient::new(config.relay_url.clone()));
    let view = Arc::new(TerminalView::default());

    let controller = ChatController::new(
        store,
        relay,
        view.clone(),
        Arc::new(Osc52Clipboard),
        ControllerOptions::default(),
    );
    controller.start().await;
    view.out(&format!("{}\n", HELP));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = parse_input(&line) else {
            continue;
        };

        match input {
            Input::Quit => break,
            Input::Help => view.out(&format!("{}\n", HELP)),
            Input::History => view.print_history(),
            Input::Command(command @ (Command::Submit(_) | Command::Regenerate)) => {
                // Keep reading input while the relay works; the controller
                // drops anything submitted before the reply arrives.
                let controller = controller.clone();
                tokio::spawn(async move {
                    controller.dispatch(command).await;
                });
            }
            Input::Command(command) => {
                controller.dispatch(command).await;
            }
            Input::LoadAt(n) => match view.history().get(n - 1) {
                Some(entry) => {
                    controller.dispatch(Command::Load(entry.id)).await;
                }
                None => view.out("No such chat.\n"),
            },
            Input::DeleteAt(n) => match view.history().get(n - 1) {
                Some(entry) => {
                    controller.dispatch(Command::Delete(entry.id)).await;
                }
                None => view.out("No such chat.\n"),
            },
            Input::CopyLast => {
                let messages = controller.messages().await;
                match messages.iter().rposition(|m| m.role == Role::Ai) {
                    Some(index) => {
                        controller.dispatch(Command::Copy(index)).await;
                    }
                    None => view.out("Nothing to copy yet.\n"),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_submission() {
        assert_eq!(
            parse_input("  write fizzbuzz in rust "),
            Some(Input::Command(Command::Submit("write fizzbuzz in rust".to_string())))
        );
        assert_eq!(parse_input("   "), None);
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(parse_input("/new"), Some(Input::Command(Command::NewChat)));
        assert_eq!(parse_input("/redo"), Some(Input::Command(Command::Regenerate)));
        assert_eq!(parse_input("/load 2"), Some(Input::LoadAt(2)));
        assert_eq!(parse_input("/delete 1"), Some(Input::DeleteAt(1)));
        assert_eq!(parse_input("/dark on"), Some(Input::Command(Command::SetDarkMode(true))));
        assert_eq!(parse_input("/copy"), Some(Input::CopyLast));
        assert_eq!(parse_input("/exit"), Some(Input::Quit));
    }

    #[test]
    fn test_actions_line_follows_message_actions() {
        assert_eq!(
            actions_line(&[MessageAction::Copy, MessageAction::Redo]).as_deref(),
            Some("   [/copy] [/redo]\n")
        );
        assert_eq!(actions_line(&[MessageAction::Copy]).as_deref(), Some("   [/copy]\n"));
        assert_eq!(actions_line(&[]), None);
    }

    #[test]
    fn test_bad_arguments_fall_back_to_help() {
        assert_eq!(parse_input("/load"), Some(Input::Help));
        assert_eq!(parse_input("/load 0"), Some(Input::Help));
        assert_eq!(parse_input("/delete x"), Some(Input::Help));
        assert_eq!(parse_input("/dark maybe"), Some(Input::Help));
        assert_eq!(parse_input("/frobnicate"), Some(Input::Help));
    }
}
