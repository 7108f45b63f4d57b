use anyhow::{Context, Result};
use clap::Parser;
use rate_service_rust::{app, App, AppConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "rate_service_rust", about = "Grinex rate service")]
struct Args {
    /// Path to a dotenv-style configuration file (defaults to ./.env if present)
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match &args.config {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    app::init_tracing(&config)?;

    info!("Starting Garantex Rate Service...");

    let application = App::new(config)
        .await
        .context("Failed to create application")?;
    application.run().await
}
