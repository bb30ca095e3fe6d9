//! Demo server entry point.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use apikit_axum::init_server;
use apikit_cli::{DemoArgs, demo_configuration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads DEMO_*
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = DemoArgs::parse();
    let server =
        init_server(demo_configuration(&args)).context("Failed to initialize demo server")?;

    let running = server
        .start_with(|_| {
            tracing::info!(
                port = args.port,
                authentication = args.authentication,
                "Server started, listening on port {}",
                args.port
            );
        })
        .await
        .context("Failed to start demo server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    running.stop().await?;

    Ok(())
}
