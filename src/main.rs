use tracing_subscriber::EnvFilter;

use doc_gateway::api::build_router;
use doc_gateway::{AppState, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::default().from_env();
    tracing::info!("Model API: {}", config.gemini.api_url);
    tracing::info!(
        "Generation model: {}, embedding model: {}",
        config.gemini.generation_model,
        config.gemini.embedding_model
    );

    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
