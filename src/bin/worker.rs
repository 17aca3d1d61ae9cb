//! Standalone entry point for the worker service

use berth::error::Result;
use berth::services::worker::{self, WorkerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = WorkerConfig::from_env()?;
    let outcome = worker::run(&config).await;
    std::process::exit(outcome.exit_code());
}
