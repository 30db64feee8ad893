//! # Chat Gateway
//!
//! Gateway node entry point. Initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Redis and cold-store connections
//! - The WebSocket listener, partition consumer, and archiver

use anyhow::Result;
use tracing::info;

use chat_gateway::config::Settings;
use chat_gateway::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    chat_gateway::telemetry::init_tracing();

    info!("Starting Chat Gateway...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        gateway = %settings.gateway.id,
        port = %settings.gateway.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Gateway ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
