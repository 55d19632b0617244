// lib.rs - Completion relay server plus the host-independent chat client core
pub mod config;
pub mod controller;
pub mod groq_client;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod relay_client;
pub mod render;
pub mod store;
pub mod telemetry;
pub mod view;

use std::sync::Arc;

// Shared state for the relay; the provider is the only collaborator it needs
pub struct AppState {
    pub provider: Arc<dyn groq_client::CompletionProvider>,
}

pub use controller::{ChatController, Command, CommandOutcome, ControllerOptions};
pub use models::{Conversation, Message, Role};
