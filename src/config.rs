/// Configuration management for the chat client.
/// Handles command-line argument parsing and config structure.

use crate::error::{ClientError, Result};
use clap::Parser;
use directories::BaseDirs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(name = "chat-client")]
#[command(about = "Terminal client for the chat service", long_about = None)]
pub struct Config {
    /// Server URL; the REST API is served under <server>/api
    #[arg(long, env = "CHAT_SERVER_URL", default_value = "http://localhost:8000")]
    pub server: String,

    /// Directory for the session database (default: ~/.chatclient)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Enable verbose logging (DEBUG level)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse command-line arguments into Config
    pub fn from_args() -> Self {
        Config::parse()
    }

    /// Check the server URL and return it without a trailing slash
    pub fn server_url(&self) -> Result<String> {
        let url = Url::parse(&self.server)
            .map_err(|e| ClientError::ConfigError(format!("Invalid server URL '{}': {}", self.server, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(self.server.trim_end_matches('/').to_string()),
            other => Err(ClientError::ConfigError(format!(
                "Unsupported URL scheme '{}', expected http or https",
                other
            ))),
        }
    }

    /// Directory holding the session database
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.config {
            return Ok(dir.clone());
        }
        let base_dirs = BaseDirs::new()
            .ok_or_else(|| ClientError::ConfigError("Failed to get home directory".to_string()))?;
        Ok(base_dirs.home_dir().join(".chatclient"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}
