use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use directory_relay::commands::schema::register_commands;
use directory_relay::comms;
use directory_relay::config::Config;
use directory_relay::utils;

#[derive(Parser)]
#[command(name = "directory-relay", version, about = "Slash-command relay for directory administration")]
struct AppCli {
    /// JSON config file; environment variables are used when omitted
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactions webhook server
    Serve {
        #[arg(long, default_value_t = 8787, env = "PORT")]
        port: u16,
    },
    /// Publish the slash-command definitions
    Register,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config from {}", path)),
        None => Config::from_env().context("loading config from environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Serve { port } => {
            info!(version = directory_relay::VERSION, "starting directory relay on port {port}");
            comms::serve(config, port).await?;
        }
        Commands::Register => {
            let http = reqwest::Client::new();
            let count = register_commands(&config.discord, &http).await?;
            info!(count, "slash commands registered");
        }
    }

    Ok(())
}
