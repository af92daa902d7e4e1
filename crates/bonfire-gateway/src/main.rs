//! Bonfire Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p bonfire-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use bonfire_common::{try_init_tracing, AppConfig, Environment, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Pick the log format before the full config loads
    let _ = dotenvy::dotenv();
    let env: Environment = std::env::var("APP_ENV")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    if let Err(e) = try_init_tracing(&TracingConfig::for_environment(env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the server
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Bonfire Gateway...");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        port = config.server.port,
        versions = ?config.gateway.supported_versions,
        "Configuration loaded"
    );

    // Run the gateway server
    bonfire_gateway::run(config).await?;

    Ok(())
}
