use codegen_chat::config::RelayConfig;
use codegen_chat::groq_client::GroqClient;
use codegen_chat::{handlers, telemetry, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    telemetry::init_logging("Completion relay")?;

    let config = RelayConfig::from_env()?;

    tracing::info!("Initializing Groq client (model {})...", config.groq_model);
    let provider = GroqClient::with_base_url(
        config.groq_api_key.clone(),
        config.groq_base_url.clone(),
        config.groq_model.clone(),
    );

    let shared_state = Arc::new(AppState {
        provider: Arc::new(provider),
    });

    let app = handlers::app(shared_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Backend server listening at http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
