// src/relay_client.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handlers::generate::NO_CONTENT;

#[derive(Error, Debug)]
pub enum RelayClientError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Relay returned status {0}")]
    Status(u16),
    #[error("Relay returned a non-JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// How the chat controller reaches the Completion Relay.
#[async_trait]
pub trait CompletionRelay: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RelayClientError>;
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct RelayResponse {
    code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    client: Client,
    endpoint: String,
}

impl HttpRelayClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CompletionRelay for HttpRelayClient {
    async fn generate(&self, prompt: &str) -> Result<String, RelayClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RelayRequest { prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayClientError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: RelayResponse = serde_json::from_slice(&body)?;
        Ok(parsed
            .code
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| NO_CONTENT.to_string()))
    }
}
