//! Configuration management for the SocialBu client

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

pub const DEFAULT_BASE_URL: &str = "https://socialbu.com/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SocialBu API bearer token.
    pub token: Option<String>,
    /// Account IDs to post to when none are given explicitly.
    #[serde(default)]
    pub account_ids: Vec<u64>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Shared secret for verifying inbound webhook signatures.
    pub secret: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            account_ids: Vec::new(),
            base_url: default_base_url(),
            http: HttpConfig::default(),
            webhooks: WebhookConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply `SOCIALBU_*`
    /// environment overrides. A missing config file yields the defaults.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("SOCIALBU_TOKEN") {
            if !token.is_empty() {
                self.token = Some(token);
            }
        }
        if let Ok(ids) = std::env::var("SOCIALBU_ACCOUNT_IDS") {
            let parsed: Vec<u64> = ids
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                self.account_ids = parsed;
            }
        }
        if let Ok(url) = std::env::var("SOCIALBU_BASE_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(timeout) = std::env::var("SOCIALBU_TIMEOUT") {
            if let Ok(seconds) = timeout.parse() {
                self.http.timeout = seconds;
            }
        }
        if let Ok(timeout) = std::env::var("SOCIALBU_CONNECT_TIMEOUT") {
            if let Ok(seconds) = timeout.parse() {
                self.http.connect_timeout = seconds;
            }
        }
        if let Ok(secret) = std::env::var("SOCIALBU_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                self.webhooks.secret = Some(secret);
            }
        }
    }

    /// Whether enough configuration is present to talk to the API.
    pub fn is_configured(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SOCIALBU_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("socialbu").join("config.toml"))
}
