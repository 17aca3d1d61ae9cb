//! Standalone entry point for the web service

use berth::error::Result;
use berth::services::web::{WebConfig, WebServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = WebConfig::from_env()?;
    let server = WebServer::bind(config).await?;
    server.serve().await
}
