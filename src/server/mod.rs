// src/server/mod.rs
//! depot HTTP server
//!
//! Serves package repositories over HTTP:
//! - Repository management (create, delete, list, info)
//! - Package upload (single and multipart batch) and download
//! - Metadata refresh and metadata file serving (yum repodata, apt
//!   indexes)
//! - Checksum lookup
//!
//! The repository core is blocking; handlers bridge into it with
//! `spawn_blocking` and stream large local files directly.

mod handlers;
mod routes;

pub use routes::create_router;

use crate::config::DepotConfig;
use crate::service::RepoService;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Root directory shared by all storage backends
    pub storage_root: PathBuf,
    /// Bearer token required on mutating endpoints; `None` disables auth
    pub auth_token: Option<String>,
    /// Refresh repository metadata after each single-file upload
    pub auto_refresh: bool,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_config(config: &DepotConfig) -> Result<Self> {
        Ok(Self {
            bind_addr: config
                .server
                .bind
                .parse()
                .with_context(|| format!("Invalid bind address: {}", config.server.bind))?,
            storage_root: config.storage.root.clone(),
            auth_token: config.auth.token.clone(),
            auto_refresh: config.server.auto_refresh,
            max_upload_bytes: config.server.max_upload_bytes,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            storage_root: PathBuf::from("/var/lib/depot"),
            auth_token: None,
            auto_refresh: true,
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Shared server state
pub struct ServerState {
    pub service: Arc<RepoService>,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(service: RepoService, config: ServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            config,
        }
    }
}

/// Build the service, bind, and serve until the process exits.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    tracing::info!("Starting depot server on {}", config.bind_addr);
    tracing::info!("Storage root: {:?}", config.storage_root);
    if config.auth_token.is_some() {
        tracing::info!("Bearer auth: enabled for mutating endpoints");
    }

    let service = RepoService::from_defaults(&config.storage_root)
        .context("Failed to initialize repository service")?;
    let state = Arc::new(ServerState::new(service, config.clone()));

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
