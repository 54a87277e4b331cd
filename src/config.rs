// src/config.rs

//! Configuration file parsing for the depot server
//!
//! Supports TOML configuration files with the following sections:
//! - [server] - Bind address, upload limits, auto-refresh
//! - [storage] - Root directory for all backends
//! - [auth] - Bearer token for mutating endpoints

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct DepotConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub auth: AuthSection,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            storage: StorageSection::default(),
            auth: AuthSection::default(),
        }
    }
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Regenerate repository metadata after each single-file upload
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload(),
            auto_refresh: true,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_upload() -> usize {
    1024 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Storage configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Root directory shared by all storage backends
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/var/lib/depot")
}

/// Auth configuration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSection {
    /// Bearer token required on mutating endpoints; unset disables auth
    #[serde(default)]
    pub token: Option<String>,
}

impl DepotConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DepotConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))?;

        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be non-zero");
        }

        if let Some(token) = &self.auth.token {
            if token.is_empty() {
                anyhow::bail!("auth.token must not be empty; omit it to disable auth");
            }
        }

        Ok(())
    }
}
