//! hermodr - binary RPC gateway for a running game server.
//!
//! The standalone binary serves a static world; embedders construct a
//! `Server` over their own `Collaborators` instead.

use hermodr_server::{Config, Server, ServerConfig, StaticWorld};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if HERMODR_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("HERMODR_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting hermodr gateway");
    let server_config = ServerConfig::from_config(&config).await?;
    tracing::info!(
        "  Bind address: {} ({}:{})",
        server_config.bind_addr,
        config.network.host,
        config.network.port
    );
    tracing::info!("  Max connections: {}", config.limits.max_connections);
    tracing::info!("  Max payload: {} bytes", config.limits.max_payload_bytes);
    tracing::info!("  World: {}", config.world.name);

    let world = Arc::new(StaticWorld::new(config.world.name.clone()));
    let server = Arc::new(Server::new(server_config, world));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown and drain)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
