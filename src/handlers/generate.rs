// src/handlers/generate.rs
use crate::groq_client::GroqError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

pub const SYSTEM_PROMPT: &str = "You are a highly skilled code generation and explanation AI. \
Your task is to generate complete, correct, and well-commented code in the language requested by the user's prompt. \
Following the code block, provide a detailed, step-by-step explanation of how the code works.

Format your response as a single markdown document with the following structure:
- A single markdown code block for the code.
- A section with the heading \"Explanation\" followed by the detailed, step-by-step breakdown using headings and/or bullet points.";

pub const NO_CONTENT: &str = "No content generated.";

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub code: String,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Prompt is required")]
    PromptRequired,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Upstream error: {0}")]
    Upstream(#[from] GroqError),
}

impl RelayError {
    fn status(&self) -> StatusCode {
        match self {
            RelayError::PromptRequired => StatusCode::BAD_REQUEST,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the caller sees. Upstream details stay in the server log.
    fn public_message(&self) -> &'static str {
        match self {
            RelayError::PromptRequired => "Prompt is required",
            RelayError::MethodNotAllowed => "Method not allowed",
            RelayError::Upstream(_) => "Failed to generate content from AI model.",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if let RelayError::Upstream(ref err) = self {
            tracing::error!("Error generating code: {}", err);
        }
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub fn generate_routes() -> Router {
    let endpoint = post(generate_code).fallback(method_not_allowed);

    Router::new()
        .route("/generate-code", endpoint.clone())
        .route("/api/generate-code", endpoint)
}

async fn generate_code(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, RelayError> {
    // A body that is not a JSON object counts as a missing prompt.
    let prompt = serde_json::from_slice::<GenerateRequest>(&body)
        .ok()
        .and_then(|request| request.prompt)
        .filter(|prompt| !prompt.is_empty())
        .ok_or(RelayError::PromptRequired)?;

    tracing::info!("Received prompt: \"{}\"", prompt);

    let generated = state
        .provider
        .complete(SYSTEM_PROMPT, &prompt)
        .await?
        .unwrap_or_else(|| NO_CONTENT.to_string());

    tracing::debug!("Generated response: {} chars", generated.chars().count());

    Ok(Json(GenerateResponse { code: generated }))
}

async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}
