use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

/// Which Cloudflare feature carries the DNSLink for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// URL-rewrite rules in the http_request_transform ruleset,
    /// plus the DNSLink TXT record.
    Rules,
    /// DNSLink TXT record only.
    Txt,
    /// Web3 Gateway hostname record.
    Web3,
}

/// Cloudflare API credentials, either header scheme.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Token { api_token: String },
    KeyPair { email: String, api_key: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub mode: UpdateMode,
    #[serde(default)]
    pub key: Option<String>, // access key for the endpoint (optional)
    #[serde(flatten)]
    pub credentials: Credentials,
    pub zone: String,
    /// Hostname the rewrite rules match; defaults to the zone name.
    #[serde(default)]
    pub record: Option<String>,
    /// Overrides the Cloudflare API base URL, e.g. for a local proxy.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl TargetConfig {
    pub fn record(&self) -> &str {
        self.record.as_deref().unwrap_or(&self.zone)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn get_target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }
}
