// src/groq_client.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Error, Debug)]
pub enum GroqError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Anything that can turn a system directive plus a user prompt into text.
///
/// The relay handler only talks to this trait, so tests can swap the hosted
/// API for a canned responder.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the first choice's text, `None` when the API answered without content.
    async fn complete(&self, system: &str, prompt: &str) -> Result<Option<String>, GroqError>;

    fn model(&self) -> &str;

    /// Whether credentials for the upstream service are present.
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<CompletionMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

impl CompletionMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatCompletionResponse {
    /// Content of the first choice, treating an empty string like a missing one.
    pub fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
    }
}

impl GroqClient {
    pub const TEMPERATURE: f32 = 0.5;
    pub const MAX_TOKENS: u32 = 2048;

    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), DEFAULT_MODEL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn build_request(&self, system: &str, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![CompletionMessage::system(system), CompletionMessage::user(prompt)],
            temperature: Self::TEMPERATURE,
            max_tokens: Self::MAX_TOKENS,
        }
    }

    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, GroqError> {
        tracing::debug!(
            "Groq API Request: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(GroqError::Api {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&response_text)?;
        if let Some(ref usage) = parsed.usage {
            tracing::debug!(
                "Groq usage: prompt={} completion={} total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }
        Ok(parsed)
    }
}

#[async_trait]
impl CompletionProvider for GroqClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<Option<String>, GroqError> {
        let request = self.build_request(system, prompt);
        let response = self.create_chat_completion(&request).await?;
        Ok(response.first_content())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
