mod api;
mod cli;
mod live;
mod router;
mod seed;
mod startup;
mod state;

use clap::Parser;
use relay_core::Config;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // .env must be loaded before clap reads env-backed arguments.
    relay_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = match &cli.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };

    match cli.command.unwrap_or(Command::Serve { port: None, host: None }) {
        Command::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            config.validate()?;
            config.log_summary();
            startup::serve(&config).await?;
        }
        Command::Seed { file } => {
            config.validate()?;
            config.log_summary();
            startup::seed_only(&config, &file).await?;
        }
    }

    Ok(())
}
