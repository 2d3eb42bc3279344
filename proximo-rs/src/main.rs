//! proximo-rs: per-hostname reverse proxy server

use proximo_rs::{FileConfigStore, ProxyConfig, ProxyServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "proximo.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proximo_rs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting proximo-rs v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    info!("Loading configuration from {}", config_path.display());

    // Server settings are fixed at startup; host settings are re-read per request.
    let config = ProxyConfig::from_file(&config_path)?;
    config.validate()?;

    let store = Arc::new(FileConfigStore::new(config_path));
    let server = ProxyServer::new(config.server, store);

    server.run().await?;

    Ok(())
}
