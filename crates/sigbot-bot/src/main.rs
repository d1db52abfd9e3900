//! Signal lifecycle bot - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

use sigbot_bot::config::DEFAULT_CONFIG_PATH;

/// Signal-driven position lifecycle bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SIGBOT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv().ok();

    let args = Args::parse();

    sigbot_telemetry::init_logging()?;

    info!("Starting sigbot v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    info!(config_path = %args.config, "Loading configuration");
    let config = sigbot_bot::AppConfig::load(&args.config)?;
    info!(
        base_url = %config.exchange.base_url,
        is_mainnet = config.exchange.is_mainnet,
        check_interval_secs = config.monitor.check_interval_secs,
        port = config.api.port,
        "Configuration loaded"
    );

    let app = sigbot_bot::Application::new(config)?;
    app.run_preflight().await?;
    app.run().await?;

    Ok(())
}
