//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! identity service endpoint and project, and the backend API base URL.
//!
//! Configuration is stored at `~/.config/rescuelink/config.json`; the
//! `RESCUELINK_*` environment variables override it, and a `.env` file is
//! honored when present. Missing values are reported but never fatal, so a
//! host application can supply its own `Config` programmatically.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
const APP_NAME: &str = "rescuelink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds.
/// 30s allows for slow mobile networks while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the identity service, e.g. `https://id.rescuelink.app/v1`.
    #[serde(default)]
    pub identity_endpoint: String,
    /// Project id sent on every identity call.
    #[serde(default)]
    pub identity_project: String,
    /// Base URL of the RescueLink backend API.
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity_endpoint: String::new(),
            identity_project: String::new(),
            api_base_url: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load the configuration: file first, then environment overrides.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();

        if config.identity_project.is_empty() {
            warn!("Identity project is not configured; identity calls will be rejected");
        }
        if config.api_base_url.is_empty() {
            warn!("API base URL is not configured");
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("RESCUELINK_IDENTITY_ENDPOINT") {
            self.identity_endpoint = endpoint;
        }
        if let Ok(project) = std::env::var("RESCUELINK_IDENTITY_PROJECT") {
            self.identity_project = project;
        }
        if let Ok(url) = std::env::var("RESCUELINK_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Ok(timeout) = std::env::var("RESCUELINK_REQUEST_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring unparsable request timeout"),
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the file-backed credential store.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
