// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use depot::config::DepotConfig;
use depot::server::{run_server, ServerConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "depot")]
#[command(author, version, about = "Package repository server for RPM, DEB, and file artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bind address, overriding the config file
        #[arg(short, long)]
        bind: Option<String>,
        /// Storage root, overriding the config file
        #[arg(short, long)]
        storage_root: Option<PathBuf>,
    },
    /// Parse and validate a configuration file, then exit
    CheckConfig {
        /// Path to the TOML configuration file
        config: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<DepotConfig> {
    match path {
        Some(path) => DepotConfig::load(path),
        None => Ok(DepotConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            storage_root,
        } => {
            let mut file_config = load_config(config.as_ref())?;
            if let Some(bind) = bind {
                file_config.server.bind = bind;
            }
            if let Some(root) = storage_root {
                file_config.storage.root = root;
            }
            file_config.validate()?;

            let server_config = ServerConfig::from_config(&file_config)?;
            run_server(server_config).await
        }
        Commands::CheckConfig { config } => {
            DepotConfig::load(&config)?;
            info!("Configuration {} is valid", config.display());
            Ok(())
        }
    }
}
