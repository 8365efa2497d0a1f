//! Binary entry point for the persona chat proxy.
//!
//! Loads the YAML configuration (falling back to defaults when the file is
//! absent), constructs the upstream client, and runs the axum server until
//! Ctrl+C or SIGTERM.

use anyhow::Result;
use clap::Parser;
use confab_core::{create_client, ConfigLoader, ResponseDelivery};
use confab_server::{shutdown_signal, ProxyServer, ServerConfig};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "confab-server - persona chat proxy")]
struct Cli {
    #[clap(long, short, default_value = "confab.yaml", help = "Path to the YAML configuration file")]
    config: String,

    #[clap(long, help = "Override the configured bind address")]
    bind_addr: Option<String>,

    #[clap(long, help = "Override the configured delivery mode (buffered or streamed)")]
    delivery: Option<String>,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    log::info!("Loading configuration from: {}", cli.config);
    let config = ConfigLoader::from_file_or_default(&cli.config).await?;

    let llm = create_client(&config.llm)?;

    let mut server_config = ServerConfig::from_config(&config)?;
    if let Some(bind_addr) = cli.bind_addr {
        server_config = server_config.with_bind_addr_str(&bind_addr)?;
    }
    if let Some(delivery) = cli.delivery {
        server_config = server_config.with_delivery(match delivery.as_str() {
            "buffered" => ResponseDelivery::Buffered,
            "streamed" => ResponseDelivery::Streamed,
            other => anyhow::bail!("Unknown delivery mode '{}', expected buffered or streamed", other),
        });
    }

    log::info!("Starting proxy server on {}...", server_config.bind_addr);
    let server = ProxyServer::with_config(llm, server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
