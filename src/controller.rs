// src/controller.rs
//! Chat Controller: the idle / awaiting-response state machine that ties the
//! relay, the conversation store and the view together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::models::{Conversation, Message, Role};
use crate::relay_client::CompletionRelay;
use crate::render::{spawn_reveal, MarkdownRenderer, RevealHandle, REVEAL_INTERVAL};
use crate::store::ConversationStore;
use crate::view::{ChatView, Clipboard, HistoryEntry, COPIED_LABEL, COPY_LABEL};

pub const FAILURE_TEXT: &str = "Failed to connect to the server.";
pub const COPY_REVERT_AFTER: Duration = Duration::from_secs(2);

/// Timing knobs, fixed for the lifetime of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Delay between revealed characters.
    pub reveal_interval: Duration,
    /// How long the "Copied!" label stays before reverting.
    pub copy_revert_after: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            reveal_interval: REVEAL_INTERVAL,
            copy_revert_after: COPY_REVERT_AFTER,
        }
    }
}

/// Everything a host can ask the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Regenerate,
    Delete(i64),
    Load(i64),
    NewChat,
    SetDarkMode(bool),
    /// Copy the raw text of the message at this index in the active conversation.
    Copy(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Dropped without side effects (blank prompt, request in flight, nothing to redo).
    Ignored,
    Done,
    /// The relay answered and the reply was recorded.
    Answered,
    /// The relay failed; the failure text was recorded instead.
    Failed,
    NotFound,
}

/// Application state owned by the controller.
pub struct ChatState {
    pub messages: Vec<Message>,
    pub conversation_id: Option<i64>,
    pub generating: bool,
    /// Bumped whenever the active conversation is swapped out.
    epoch: u64,
    reveal: Option<RevealHandle>,
    /// Pending label reverts, one per message index.
    copy_timers: HashMap<usize, JoinHandle<()>>,
    store: ConversationStore,
}

impl ChatState {
    fn cancel_reveal(&mut self) {
        if let Some(handle) = self.reveal.take() {
            handle.cancel();
        }
    }

    fn reset(&mut self) {
        self.cancel_reveal();
        for (_, timer) in self.copy_timers.drain() {
            timer.abort();
        }
        self.messages.clear();
        self.conversation_id = None;
        self.epoch += 1;
    }

    fn history_entries(&self) -> Vec<HistoryEntry> {
        self.store
            .catalog()
            .iter()
            .map(|c| HistoryEntry {
                id: c.id,
                title: c.title.clone(),
                active: Some(c.id) == self.conversation_id,
            })
            .collect()
    }
}

struct Inner {
    state: Mutex<ChatState>,
    relay: Arc<dyn CompletionRelay>,
    view: Arc<dyn ChatView>,
    clipboard: Arc<dyn Clipboard>,
    renderer: Arc<MarkdownRenderer>,
    options: ControllerOptions,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

/// Where a submission came from, so a late answer lands in the right conversation.
struct Origin {
    epoch: u64,
    conversation_id: Option<i64>,
    messages: Vec<Message>,
}

impl ChatController {
    pub fn new(
        store: ConversationStore,
        relay: Arc<dyn CompletionRelay>,
        view: Arc<dyn ChatView>,
        clipboard: Arc<dyn Clipboard>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ChatState {
                    messages: Vec::new(),
                    conversation_id: None,
                    generating: false,
                    epoch: 0,
                    reveal: None,
                    copy_timers: HashMap::new(),
                    store,
                }),
                relay,
                view,
                clipboard,
                renderer: Arc::new(MarkdownRenderer::new()),
                options,
            }),
        }
    }

    /// Paints the initial screen: theme, welcome message, history list.
    pub async fn start(&self) {
        let state = self.inner.state.lock().await;
        let view = &self.inner.view;
        view.set_dark_mode(state.store.dark_mode());
        view.show_welcome();
        view.render_history(&state.history_entries());
    }

    pub async fn dispatch(&self, command: Command) -> CommandOutcome {
        tracing::debug!("Dispatching {:?}", command);
        match command {
            Command::Submit(prompt) => self.submit(&prompt).await,
            Command::Regenerate => self.regenerate().await,
            Command::Delete(id) => self.delete(id).await,
            Command::Load(id) => self.load(id).await,
            Command::NewChat => self.new_chat().await,
            Command::SetDarkMode(enabled) => self.set_dark_mode(enabled).await,
            Command::Copy(index) => self.copy(index).await,
        }
    }

    pub async fn submit(&self, prompt: &str) -> CommandOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return CommandOutcome::Ignored;
        }

        let origin = {
            let mut state = self.inner.state.lock().await;
            if state.generating {
                tracing::debug!("Submission dropped: a request is already in flight");
                return CommandOutcome::Ignored;
            }
            state.generating = true;

            let user = Message::user(prompt);
            let view = &self.inner.view;
            view.append_message(&self.inner.renderer.render_message(&user));
            state.messages.push(user);
            view.show_placeholder();
            view.scroll_to_bottom();
            view.set_submit_enabled(false);

            Origin {
                epoch: state.epoch,
                conversation_id: state.conversation_id,
                messages: state.messages.clone(),
            }
        };

        let result = self.inner.relay.generate(prompt).await;

        let mut state = self.inner.state.lock().await;
        let outcome = match result {
            Ok(text) => {
                self.record_reply(&mut state, origin, Message::ai(text), false);
                CommandOutcome::Answered
            }
            Err(e) => {
                tracing::error!("Fetch error: {}", e);
                self.record_reply(&mut state, origin, Message::ai(FAILURE_TEXT), true);
                CommandOutcome::Failed
            }
        };

        state.generating = false;
        self.inner.view.set_submit_enabled(true);
        outcome
    }

    /// Re-submits the most recent user message, if any.
    pub async fn regenerate(&self) -> CommandOutcome {
        let last_user = {
            let state = self.inner.state.lock().await;
            state
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
        };

        match last_user {
            Some(prompt) => self.submit(&prompt).await,
            None => CommandOutcome::Ignored,
        }
    }

    /// Leaves both the catalog and the screen untouched when the id is
    /// unknown or the catalog cannot be written.
    pub async fn delete(&self, id: i64) -> CommandOutcome {
        let mut state = self.inner.state.lock().await;
        match state.store.delete(id) {
            Ok(true) => {}
            Ok(false) => return CommandOutcome::NotFound,
            Err(e) => {
                tracing::error!("Failed to delete conversation {}: {}", id, e);
                return CommandOutcome::Failed;
            }
        }

        let view = &self.inner.view;
        if state.conversation_id == Some(id) {
            state.reset();
            view.clear();
            view.show_welcome();
        }
        view.render_history(&state.history_entries());
        CommandOutcome::Done
    }

    pub async fn load(&self, id: i64) -> CommandOutcome {
        let mut state = self.inner.state.lock().await;
        let Some(conversation) = state.store.get(id).cloned() else {
            return CommandOutcome::NotFound;
        };

        state.reset();
        state.conversation_id = Some(conversation.id);
        state.messages = conversation.messages;

        let view = &self.inner.view;
        view.clear();
        for message in &state.messages {
            view.append_message(&self.inner.renderer.render_message(message));
        }
        view.scroll_to_bottom();
        view.render_history(&state.history_entries());
        CommandOutcome::Done
    }

    pub async fn new_chat(&self) -> CommandOutcome {
        let mut state = self.inner.state.lock().await;
        state.reset();

        let view = &self.inner.view;
        view.clear();
        view.show_welcome();
        view.render_history(&state.history_entries());
        CommandOutcome::Done
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> CommandOutcome {
        let state = self.inner.state.lock().await;
        if let Err(e) = state.store.set_dark_mode(enabled) {
            tracing::warn!("Failed to persist dark mode preference: {}", e);
        }
        self.inner.view.set_dark_mode(enabled);
        CommandOutcome::Done
    }

    /// A repeated copy of the same message restarts its revert timer.
    pub async fn copy(&self, index: usize) -> CommandOutcome {
        let mut state = self.inner.state.lock().await;
        let Some(message) = state.messages.get(index) else {
            return CommandOutcome::NotFound;
        };

        if let Err(e) = self.inner.clipboard.write_text(&message.content) {
            tracing::warn!("Copy failed: {}", e);
            return CommandOutcome::Failed;
        }

        if let Some(previous) = state.copy_timers.remove(&index) {
            previous.abort();
        }
        state.copy_timers.retain(|_, t| !t.is_finished());

        let view = self.inner.view.clone();
        view.set_copy_label(index, COPIED_LABEL);
        let revert_after = self.inner.options.copy_revert_after;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(revert_after).await;
            view.set_copy_label(index, COPY_LABEL);
        });
        state.copy_timers.insert(index, timer);
        CommandOutcome::Done
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().await.messages.clone()
    }

    pub async fn conversation_id(&self) -> Option<i64> {
        self.inner.state.lock().await.conversation_id
    }

    pub async fn is_generating(&self) -> bool {
        self.inner.state.lock().await.generating
    }

    pub async fn catalog(&self) -> Vec<Conversation> {
        self.inner.state.lock().await.store.catalog().to_vec()
    }

    /// Waits for the current reveal animation, if one is running.
    pub async fn finish_reveal(&self) {
        let handle = self.inner.state.lock().await.reveal.take();
        if let Some(handle) = handle {
            handle.join().await;
        }
    }

    fn record_reply(&self, state: &mut ChatState, origin: Origin, reply: Message, is_error: bool) {
        let view = &self.inner.view;

        if state.epoch != origin.epoch {
            // The user switched conversations while waiting; file the reply
            // under the conversation it belongs to and leave the screen alone.
            self.record_detached(state, origin, reply);
            return;
        }

        state.messages.push(reply.clone());
        match state.store.save(state.conversation_id, &state.messages) {
            Ok(Some(id)) => state.conversation_id = Some(id),
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to persist chat history: {}", e),
        }
        view.render_history(&state.history_entries());

        if is_error {
            view.show_error(&reply.content);
            view.scroll_to_bottom();
        } else {
            state.cancel_reveal();
            state.reveal = Some(spawn_reveal(
                view.clone(),
                self.inner.renderer.clone(),
                reply,
                self.inner.options.reveal_interval,
            ));
        }
    }

    fn record_detached(&self, state: &mut ChatState, origin: Origin, reply: Message) {
        if let Some(id) = origin.conversation_id {
            if state.store.get(id).is_none() {
                tracing::debug!("Dropping reply for deleted conversation {}", id);
                return;
            }
        }

        let mut messages = origin.messages;
        messages.push(reply);
        if let Err(e) = state.store.save(origin.conversation_id, &messages) {
            tracing::error!("Failed to persist chat history: {}", e);
        }

        // Same conversation reopened mid-request: catch the screen up.
        if origin.conversation_id.is_some() && origin.conversation_id == state.conversation_id {
            let view = &self.inner.view;
            for message in &messages[state.messages.len().min(messages.len())..] {
                view.append_message(&self.inner.renderer.render_message(message));
            }
            view.scroll_to_bottom();
            state.messages = messages;
        }
        self.inner.view.render_history(&state.history_entries());
    }
}
