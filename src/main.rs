//! # Chat Gateway
//!
//! Process entry point:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Durable store and pub/sub backbone connections
//! - HTTP/WebSocket server
//!
//! Any startup failure is logged and exits with status 1.

use anyhow::Result;
use tracing::{error, info};

use chat_gateway::config::Settings;
use chat_gateway::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    chat_gateway::telemetry::init_tracing();

    info!(pid = std::process::id(), "Starting chat gateway...");

    let settings = Settings::load().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings, Vec::new())
        .await
        .inspect_err(|e| error!(error = %e, "Startup failed"))?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
