//! api-rest - authenticated REST helper
//!
//! Sends requests to the configured API with the given session attached.
//! Run `api-rest --help` for the available commands.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use api_rest::cli::commands::{Cli, Commands};
use api_rest::cli::{config, request};
use api_rest::core::config::RuntimeConfig;
use api_rest::error::Result;
use api_rest::http::ApiClient;

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Config commands don't need a client
        Commands::Config(args) => {
            let path = match cli.config {
                Some(path) => path,
                None => RuntimeConfig::config_path()?,
            };
            config::handle_config(args.command, &path)
        }
        Commands::Get(args) => {
            let client = connect(cli.config, cli.token, cli.refresh_code)?;
            request::handle_get(&client, args).await
        }
        Commands::Post(args) => {
            let client = connect(cli.config, cli.token, cli.refresh_code)?;
            request::handle_post(&client, args).await
        }
        Commands::Refresh => {
            let client = connect(cli.config, cli.token, cli.refresh_code)?;
            request::handle_refresh(&client).await
        }
    }
}

/// Load configuration and build a client holding the given session
fn connect(
    config_path: Option<PathBuf>,
    token: Option<String>,
    refresh_code: Option<String>,
) -> Result<ApiClient> {
    let runtime = match config_path {
        Some(path) => {
            let mut runtime = RuntimeConfig::load_from(&path)?;
            runtime.apply_env_overrides();
            runtime
        }
        None => RuntimeConfig::load()?,
    };

    let store = request::build_store(token, refresh_code);
    request::build_client(&runtime, store)
}
