use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use chat_relay::config::{Cli, Config};
use chat_relay::generator::agent::Agent;
use chat_relay::generator::engine::ResponseGenerator;
use chat_relay::provider::azure::AzureOpenAiProvider;
use chat_relay::server::chat_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "chat_relay=debug,tower_http=debug"
    } else {
        "chat_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("chat-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli)?;

    info!(
        provider = ?config.provider,
        agent = config.agent.name,
        "Configuration loaded"
    );
    if config.provider.endpoint.is_none() || config.provider.api_key.is_none() {
        warn!("Provider configuration incomplete; message requests will fail");
    }

    // Build the generator and application state.
    let provider = Arc::new(AzureOpenAiProvider::new(config.provider.clone()));
    let generator = ResponseGenerator::new(provider, Agent::new(&config.agent));
    let state = Arc::new(AppState::new(generator));

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen;
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
