//! Island API server entry point.
//!
//! Serves the jail API over HTTP until interrupted.

use island_api::{http, IslandConfig, IslandServer};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("island_api=info".parse()?)
                .add_directive("island_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Island API server");

    // Load configuration from environment
    let config = IslandConfig::from_env();
    tracing::info!(?config, "Configuration loaded");

    // Dataset naming must be valid; missing tools only warn so the server
    // can be started on development hosts.
    config.dataset.validate()?;
    config.tools.validate()?;
    config.validate_warn();

    let server = IslandServer::new(config.clone());

    if config.bootstrap {
        server.bootstrap().await;
    }

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Received shutdown signal");
    };

    http::serve(server, config.http_addr, shutdown).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
